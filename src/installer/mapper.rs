//! 进度映射
//!
//! 将分发服务的原始会话状态映射为规范安装阶段。纯函数，无状态、无 I/O。

use super::types::{status, RawSessionState};
use crate::state::{ErrorCode, InstallPhase, InstallProgress};

/// 计算百分比，总量为 0 时视为 0%
fn percent(done: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let value = (done as u128 * 100) / total as u128;
    value.min(100) as u8
}

/// 将原始状态映射为规范安装阶段
///
/// `target` 不在 `involved` 中时仍返回尽力而为的结果，关联检查由调用方负责。
/// 未识别的状态码映射为 `Unknown`，未识别的错误码映射为 `ErrorCode::Unknown`。
pub fn map_phase(
    raw_status: i32,
    raw_error_code: i32,
    bytes_done: u64,
    bytes_total: u64,
    _involved: &[String],
    _target: &str,
) -> InstallPhase {
    match raw_status {
        status::PENDING => InstallPhase::Pending,
        status::REQUIRES_USER_CONFIRMATION => InstallPhase::RequiresConfirmation,
        status::DOWNLOADING => InstallPhase::Downloading(percent(bytes_done, bytes_total)),
        status::DOWNLOADED => InstallPhase::Installing(0),
        status::INSTALLING => InstallPhase::Installing(percent(bytes_done, bytes_total)),
        status::INSTALLED => InstallPhase::Installed,
        status::FAILED => InstallPhase::Failed(ErrorCode::from_raw(raw_error_code)),
        status::CANCELING => InstallPhase::Canceling,
        status::CANCELED => InstallPhase::Canceled,
        _ => InstallPhase::Unknown,
    }
}

/// 将原始会话状态映射为安装进度
///
/// 只有 `RequiresConfirmation` 阶段会携带原始状态作为确认载荷
pub fn map_session_state(state: &RawSessionState, target: &str) -> InstallProgress {
    let phase = map_phase(
        state.status,
        state.error_code,
        state.bytes_downloaded,
        state.total_bytes,
        &state.module_names,
        target,
    );
    match phase {
        InstallPhase::RequiresConfirmation => InstallProgress::requires_confirmation(state.clone()),
        other => InstallProgress::new(other),
    }
}
