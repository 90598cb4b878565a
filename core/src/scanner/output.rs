/// sqlmap 在发现注入点时输出的行前缀
pub const PAYLOAD_MARKER: &str = "Payload:";

/// 从 sqlmap 的输出中提取第一条 payload。
///
/// 逐行扫描，去掉首尾空白后以 `Payload:` 开头的第一行胜出。
pub fn extract_payload(output: &str) -> Option<&str> {
    output
        .lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix(PAYLOAD_MARKER))
        .map(str::trim)
}
