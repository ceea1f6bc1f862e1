// ==========================================
// 并发处理测试
// ==========================================
// 职责: 两个连接同时处理同一批次,只能有一个成功,学籍不重复
// ==========================================

mod test_helpers;

use std::sync::{Arc, Barrier};
use std::thread;

use chrono::NaiveDate;
use school_promotion::api::{ApiError, ProcessBatchRequest};
use school_promotion::domain::types::BatchStatus;
use test_helpers::*;

#[test]
fn test_concurrent_process_只有一个成功() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    env.seed_class(TENANT, "class-5", None, 20);
    let batch = env
        .api
        .create_batch(TENANT, batch_request("class-5", None, Some("class-6")), ACTOR)
        .unwrap();
    let reqs = env
        .api
        .list_records(TENANT, &batch.batch_id)
        .unwrap()
        .records
        .iter()
        .map(|r| decide(&r.record_id, "promote", None))
        .collect();
    env.api
        .bulk_update_records(TENANT, &batch.batch_id, reqs, ACTOR)
        .unwrap();

    let barrier = Arc::new(Barrier::new(2));
    let handles: Vec<_> = (0..2)
        .map(|i| {
            let state = env.second_state();
            let barrier = barrier.clone();
            let batch_id = batch.batch_id.clone();
            thread::spawn(move || {
                barrier.wait();
                state.promotion_api.process_batch(
                    TENANT,
                    &batch_id,
                    ProcessBatchRequest {
                        generate_roll_numbers: true,
                        completion_date: NaiveDate::from_ymd_opt(2026, 3, 31),
                    },
                    &format!("worker-{}", i),
                )
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let successes = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1, "只能有一个处理成功");

    let failure = results.into_iter().find_map(|r| r.err()).unwrap();
    assert!(
        matches!(
            failure,
            ApiError::BatchAlreadyProcessed(_) | ApiError::BatchNotProcessable { .. }
        ),
        "第二个调用应看到非 draft 批次: {:?}",
        failure
    );

    let after = env.api.get_batch(TENANT, &batch.batch_id).unwrap();
    assert_eq!(after.status, BatchStatus::Completed);
    assert_eq!(after.promoted_count, 20);
    assert_eq!(env.count_year_enrollments(TENANT, YEAR_2026), 20);
}
