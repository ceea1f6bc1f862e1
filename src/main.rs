// ==========================================
// 学年升级批处理 - 运维入口
// ==========================================
// 用法:
//   school-promotion init
//   school-promotion batches <tenant_id> [status]
//   school-promotion records <tenant_id> <batch_id>
//   school-promotion process <tenant_id> <batch_id> [--roll-numbers]
//   school-promotion report <tenant_id> <batch_id>
//
// 数据库路径取 SCHOOL_PROMOTION_DB,否则用用户数据目录
// 输出一律为 JSON,便于脚本处理
// ==========================================

use anyhow::{bail, Context};
use school_promotion::api::{BatchListQuery, ProcessBatchRequest};
use school_promotion::app::{get_default_db_path, AppState};
use school_promotion::db::read_schema_version;

const OPERATOR: &str = "ops-cli";

fn main() -> anyhow::Result<()> {
    school_promotion::logging::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let db_path = get_default_db_path();

    tracing::info!(
        version = school_promotion::VERSION,
        db_path = %db_path,
        "{} 启动",
        school_promotion::APP_NAME
    );

    let state = AppState::new(db_path).map_err(anyhow::Error::msg)?;
    let api = state.promotion_api.clone();

    let arg = |i: usize, name: &str| -> anyhow::Result<String> {
        args.get(i)
            .cloned()
            .with_context(|| format!("缺少参数 <{}>", name))
    };

    let output = match args.first().map(String::as_str) {
        None | Some("init") => {
            let schema_version = {
                let conn = state
                    .conn
                    .lock()
                    .map_err(|e| anyhow::anyhow!("数据库锁获取失败: {}", e))?;
                read_schema_version(&conn)?
            };
            serde_json::json!({
                "db_path": state.db_path,
                "version": school_promotion::VERSION,
                "schema_version": schema_version,
            })
        }
        Some("batches") => {
            let query = BatchListQuery {
                status: args.get(2).cloned(),
                ..Default::default()
            };
            serde_json::to_value(api.list_batches(&arg(1, "tenant_id")?, query)?)?
        }
        Some("records") => {
            serde_json::to_value(api.list_records(&arg(1, "tenant_id")?, &arg(2, "batch_id")?)?)?
        }
        Some("process") => {
            let req = ProcessBatchRequest {
                generate_roll_numbers: args.iter().any(|a| a == "--roll-numbers"),
                completion_date: None,
            };
            serde_json::to_value(api.process_batch(
                &arg(1, "tenant_id")?,
                &arg(2, "batch_id")?,
                req,
                OPERATOR,
            )?)?
        }
        Some("report") => {
            serde_json::to_value(api.get_report(&arg(1, "tenant_id")?, &arg(2, "batch_id")?)?)?
        }
        Some(other) => bail!("未知命令: {}", other),
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
