// ==========================================
// 升级批次生命周期集成测试
// ==========================================
// 测试范围:
// 1. 创建: 记录快照、total_students、目标班级预填
// 2. 创建失败: 无学生、重复来源、学年相同
// 3. 取消/删除守卫与租户隔离
// 4. 列表过滤与条数上限
// ==========================================

mod test_helpers;

use school_promotion::api::{ApiError, BatchListQuery};
use school_promotion::config::{config_keys, ConfigScope};
use school_promotion::domain::types::{BatchStatus, Decision};
use test_helpers::*;

#[test]
fn test_create_batch_快照全部在读学生() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    env.seed_class(TENANT, "class-5", Some("A"), 3);
    env.seed_class(TENANT, "class-5", Some("B"), 2);
    env.seed_class(TENANT, "class-4", Some("A"), 4);

    let batch = env
        .api
        .create_batch(TENANT, batch_request("class-5", Some("A"), Some("class-6")), ACTOR)
        .expect("创建批次失败");

    assert_eq!(batch.status, BatchStatus::Draft);
    assert_eq!(batch.total_students, 3);

    let listing = env.api.list_records(TENANT, &batch.batch_id).unwrap();
    assert_eq!(listing.records.len(), 3);
    assert_eq!(listing.summary.total, 3);
    assert_eq!(listing.summary.pending, 3);
    for record in &listing.records {
        assert_eq!(record.decision, Decision::Pending);
        assert_eq!(record.target_class_id.as_deref(), Some("class-6"));
        assert!(record.target_roll_number.is_none());
        assert!(record.destination_enrollment_id.is_none());
    }

    // 不指定分班时覆盖整个班级
    let whole = env
        .api
        .create_batch(TENANT, batch_request("class-4", None, None), ACTOR)
        .unwrap();
    assert_eq!(whole.total_students, 4);
    let listing = env.api.list_records(TENANT, &whole.batch_id).unwrap();
    assert!(listing.records.iter().all(|r| r.target_class_id.is_none()));
}

#[test]
fn test_create_batch_忽略非在读学籍() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    env.seed_class(TENANT, "class-5", Some("A"), 2);
    let left = env.seed_student(TENANT, "gone", "已转走", YEAR_2025, "class-5", Some("A"), Some("9"));
    env.set_enrollment_status(&left, "transferred");

    let batch = env
        .api
        .create_batch(TENANT, batch_request("class-5", Some("A"), None), ACTOR)
        .unwrap();
    assert_eq!(batch.total_students, 2);
}

#[test]
fn test_create_batch_来源范围无学生() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    env.seed_class(TENANT, "class-5", Some("A"), 2);

    let err = env
        .api
        .create_batch(TENANT, batch_request("class-5", Some("Z"), None), ACTOR)
        .unwrap_err();
    assert!(matches!(err, ApiError::NoStudentsInSourceScope(_)));

    let batches = env.api.list_batches(TENANT, BatchListQuery::default()).unwrap();
    assert!(batches.is_empty(), "失败时不应留下批次");
}

#[test]
fn test_create_batch_学年相同() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    env.seed_class(TENANT, "class-5", None, 1);

    let mut req = batch_request("class-5", None, None);
    req.dest_academic_year_id = YEAR_2025.to_string();

    let err = env.api.create_batch(TENANT, req, ACTOR).unwrap_err();
    assert!(matches!(err, ApiError::InvalidAcademicYearPair(_)));
}

#[test]
fn test_create_batch_重复来源() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    env.seed_class(TENANT, "class-5", Some("A"), 2);

    let first = env
        .api
        .create_batch(TENANT, batch_request("class-5", Some("A"), None), ACTOR)
        .unwrap();

    let err = env
        .api
        .create_batch(TENANT, batch_request("class-5", Some("A"), None), ACTOR)
        .unwrap_err();
    match err {
        ApiError::DuplicateBatchForSource(existing) => assert_eq!(existing, first.batch_id),
        other => panic!("意外错误: {:?}", other),
    }

    // 取消后可以重建
    env.api
        .cancel_batch(TENANT, &first.batch_id, "重新快照", ACTOR)
        .unwrap();
    env.api
        .create_batch(TENANT, batch_request("class-5", Some("A"), None), ACTOR)
        .expect("取消后应允许重建");
}

#[test]
fn test_create_batch_整班与分班范围重叠() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    env.seed_class(TENANT, "class-5", Some("A"), 2);
    env.seed_class(TENANT, "class-5", Some("B"), 1);

    // 先整班,再分班
    let whole = env
        .api
        .create_batch(TENANT, batch_request("class-5", None, Some("class-6")), ACTOR)
        .unwrap();
    let err = env
        .api
        .create_batch(TENANT, batch_request("class-5", Some("A"), Some("class-6")), ACTOR)
        .unwrap_err();
    match err {
        ApiError::DuplicateBatchForSource(existing) => assert_eq!(existing, whole.batch_id),
        other => panic!("意外错误: {:?}", other),
    }

    // 先分班,再整班
    env.api
        .cancel_batch(TENANT, &whole.batch_id, "改为分班处理", ACTOR)
        .unwrap();
    let section_a = env
        .api
        .create_batch(TENANT, batch_request("class-5", Some("A"), Some("class-6")), ACTOR)
        .unwrap();
    let err = env
        .api
        .create_batch(TENANT, batch_request("class-5", None, Some("class-6")), ACTOR)
        .unwrap_err();
    match err {
        ApiError::DuplicateBatchForSource(existing) => assert_eq!(existing, section_a.batch_id),
        other => panic!("意外错误: {:?}", other),
    }

    // 不同分班互不重叠
    env.api
        .create_batch(TENANT, batch_request("class-5", Some("B"), Some("class-6")), ACTOR)
        .expect("不同分班应允许各自建批次");
}

#[test]
fn test_cancel_batch_需要理由且仅限草稿() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    env.seed_class(TENANT, "class-5", None, 2);
    let batch = env
        .api
        .create_batch(TENANT, batch_request("class-5", None, None), ACTOR)
        .unwrap();

    let err = env.api.cancel_batch(TENANT, &batch.batch_id, "  ", ACTOR).unwrap_err();
    assert!(matches!(err, ApiError::InvalidInput(_)));

    let cancelled = env
        .api
        .cancel_batch(TENANT, &batch.batch_id, "名单有误", ACTOR)
        .unwrap();
    assert_eq!(cancelled.status, BatchStatus::Cancelled);
    assert_eq!(cancelled.cancellation_reason.as_deref(), Some("名单有误"));
    assert_eq!(cancelled.cancelled_by.as_deref(), Some(ACTOR));
    assert!(cancelled.cancelled_at.is_some());

    let err = env
        .api
        .cancel_batch(TENANT, &batch.batch_id, "再次取消", ACTOR)
        .unwrap_err();
    assert!(matches!(err, ApiError::BatchNotDraft { .. }));

    // 取消后记录不可再改
    let record_id = env.api.list_records(TENANT, &batch.batch_id).unwrap().records[0]
        .record_id
        .clone();
    let err = env
        .api
        .update_record(TENANT, &batch.batch_id, decide(&record_id, "promote", Some("class-6")), ACTOR)
        .unwrap_err();
    assert!(matches!(err, ApiError::BatchNotDraft { .. }));

    assert_eq!(
        env.action_types(TENANT, &batch.batch_id),
        vec!["CANCEL_BATCH".to_string(), "CREATE_BATCH".to_string()]
    );
}

#[test]
fn test_delete_batch_连同记录删除() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    env.seed_class(TENANT, "class-5", None, 3);
    let batch = env
        .api
        .create_batch(TENANT, batch_request("class-5", None, None), ACTOR)
        .unwrap();

    env.api.delete_batch(TENANT, &batch.batch_id, ACTOR).expect("删除失败");

    assert!(matches!(
        env.api.get_batch(TENANT, &batch.batch_id),
        Err(ApiError::BatchNotFound(_))
    ));
    assert!(matches!(
        env.api.list_records(TENANT, &batch.batch_id),
        Err(ApiError::BatchNotFound(_))
    ));

    let remaining: i64 = env
        .state
        .conn
        .lock()
        .unwrap()
        .query_row(
            "SELECT COUNT(*) FROM promotion_record WHERE batch_id = ?1",
            [&batch.batch_id],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(remaining, 0);
}

#[test]
fn test_delete_batch_已取消不可删除() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    env.seed_class(TENANT, "class-5", None, 1);
    let batch = env
        .api
        .create_batch(TENANT, batch_request("class-5", None, None), ACTOR)
        .unwrap();
    env.api.cancel_batch(TENANT, &batch.batch_id, "作废", ACTOR).unwrap();

    let err = env.api.delete_batch(TENANT, &batch.batch_id, ACTOR).unwrap_err();
    assert!(matches!(err, ApiError::BatchNotDraft { .. }));
    assert!(env.api.get_batch(TENANT, &batch.batch_id).is_ok());
}

#[test]
fn test_batch_租户隔离() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    env.seed_class(TENANT, "class-5", None, 2);
    let batch = env
        .api
        .create_batch(TENANT, batch_request("class-5", None, None), ACTOR)
        .unwrap();

    assert!(matches!(
        env.api.get_batch(OTHER_TENANT, &batch.batch_id),
        Err(ApiError::BatchNotFound(_))
    ));
    assert!(matches!(
        env.api.cancel_batch(OTHER_TENANT, &batch.batch_id, "越权", ACTOR),
        Err(ApiError::BatchNotFound(_))
    ));
    assert!(matches!(
        env.api.delete_batch(OTHER_TENANT, &batch.batch_id, ACTOR),
        Err(ApiError::BatchNotFound(_))
    ));
    assert!(env
        .api
        .list_batches(OTHER_TENANT, BatchListQuery::default())
        .unwrap()
        .is_empty());

    // 其他租户同名班级没有学生
    let err = env
        .api
        .create_batch(OTHER_TENANT, batch_request("class-5", None, None), ACTOR)
        .unwrap_err();
    assert!(matches!(err, ApiError::NoStudentsInSourceScope(_)));
}

#[test]
fn test_list_batches_过滤与上限() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    for class_id in ["class-1", "class-2", "class-3"] {
        env.seed_class(TENANT, class_id, None, 1);
    }
    let b1 = env
        .api
        .create_batch(TENANT, batch_request("class-1", None, None), ACTOR)
        .unwrap();
    env.api
        .create_batch(TENANT, batch_request("class-2", None, None), ACTOR)
        .unwrap();
    env.api
        .create_batch(TENANT, batch_request("class-3", None, None), ACTOR)
        .unwrap();
    env.api.cancel_batch(TENANT, &b1.batch_id, "作废", ACTOR).unwrap();

    let drafts = env
        .api
        .list_batches(
            TENANT,
            BatchListQuery {
                status: Some("draft".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(drafts.len(), 2);

    let by_class = env
        .api
        .list_batches(
            TENANT,
            BatchListQuery {
                source_class_id: Some("class-1".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(by_class.len(), 1);
    assert_eq!(by_class[0].status, BatchStatus::Cancelled);

    let err = env
        .api
        .list_batches(
            TENANT,
            BatchListQuery {
                status: Some("archived".to_string()),
                ..Default::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidInput(_)));

    // 租户级上限
    env.state
        .config_manager
        .set_value(&ConfigScope::tenant(TENANT), config_keys::LIST_MAX_LIMIT, "2")
        .unwrap();
    let capped = env
        .api
        .list_batches(
            TENANT,
            BatchListQuery {
                limit: Some(50),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(capped.len(), 2);
}
