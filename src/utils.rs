//! 通用工具：时钟、日志输出与分组标识生成。

use log::{Level, LevelFilter, Log, Metadata, Record};
use rand::Rng;

const GROUP_ID_PREFIX: &str = "group-";
const GROUP_ID_LEN: usize = 9;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

#[cfg(target_arch = "wasm32")]
pub fn now_ms() -> u64 {
    web_sys::js_sys::Date::now() as u64
}

#[cfg(not(target_arch = "wasm32"))]
pub fn now_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};

    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

/// 生成邀请链接使用的分组标识，例如 `group-k3x9a0b2c`。
pub fn generate_group_id() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..GROUP_ID_LEN)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    format!("{GROUP_ID_PREFIX}{suffix}")
}

/// 将 `log` 记录写到浏览器控制台（原生目标下写到 stderr）。
#[derive(Debug, Clone, Copy)]
pub struct ConsoleLogger;

static LOGGER: ConsoleLogger = ConsoleLogger;

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format!("[{}] {}: {}", record.level(), record.target(), record.args());
        emit(record.level(), &line);
    }

    fn flush(&self) {}
}

#[cfg(target_arch = "wasm32")]
fn emit(level: Level, line: &str) {
    use wasm_bindgen::JsValue;
    use web_sys::console;

    let value = JsValue::from_str(line);
    match level {
        Level::Error => console::error_1(&value),
        Level::Warn => console::warn_1(&value),
        _ => console::log_1(&value),
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn emit(_level: Level, line: &str) {
    eprintln!("{line}");
}

/// 安装控制台日志；已安装其他 logger 时保持不变。
pub fn init_logging(level: LevelFilter) {
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_ids_use_prefix_and_base36_suffix() {
        let id = generate_group_id();
        let suffix = id
            .strip_prefix(GROUP_ID_PREFIX)
            .expect("group id should carry the prefix");
        assert_eq!(suffix.len(), GROUP_ID_LEN);
        assert!(suffix
            .bytes()
            .all(|byte| byte.is_ascii_digit() || byte.is_ascii_lowercase()));
    }

    #[test]
    fn clock_is_past_2020() {
        assert!(now_ms() > 1_577_836_800_000);
    }
}
