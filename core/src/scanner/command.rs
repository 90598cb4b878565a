//! sqlmap 参数构建
//!
//! 把一个扫描目标和批次选项转换成 sqlmap 的命令行参数。纯函数，没有共享状态。

use super::{ScanOptions, ScanTarget};
use serde_json::{Map, Value};

/// URL 中表示注入点的占位符
pub const FUZZ_MARKER: &str = "FUZZ";
/// 注入点的取值，`*` 是 sqlmap 的自定义注入标记
pub const FUZZ_VALUE: &str = "1*";
/// 其余参数的探测值
pub const PROBE_VALUE: &str = "test";

const JSON_CONTENT_TYPE: &str = "Content-Type: application/json";

/// 注入技术集合
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Technique {
    /// 布尔盲注、报错、联合查询、堆叠查询、内联查询
    Standard,
    /// 在 Standard 基础上加入时间盲注
    TimeBased,
}

impl Technique {
    pub fn from_flag(time_based: bool) -> Self {
        if time_based {
            Technique::TimeBased
        } else {
            Technique::Standard
        }
    }

    pub fn as_arg(&self) -> &'static str {
        match self {
            Technique::Standard => "--technique=BEUSQ",
            Technique::TimeBased => "--technique=BEUSTQ",
        }
    }
}

/// 构建好的 sqlmap 调用
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlmapCommand {
    /// 传给 sqlmap 的完整参数（不含解释器和脚本路径）
    pub args: Vec<String>,
    /// --data 携带的请求体
    pub data: Option<String>,
}

/// 构建 sqlmap 参数。
///
/// 没有表单/JSON 参数且 URL 中也没有 `FUZZ` 标记时返回 `None`，
/// 表示该目标无法扫描，调用方应直接把任务标记为 skipped。
pub fn build_command(target: &ScanTarget, options: &ScanOptions) -> Option<SqlmapCommand> {
    let mut header_args: Vec<String> = header_lines(target)
        .into_iter()
        .map(|header| format!("--headers={}", header))
        .collect();

    let data = if !target.body_params.is_empty() {
        header_args.push(format!("--headers={}", JSON_CONTENT_TYPE));
        Some(build_json_data(&target.body_params))
    } else if !target.form_params.is_empty() {
        Some(build_form_data(&target.form_params))
    } else {
        None
    };

    if data.is_none() && !target.url.contains(FUZZ_MARKER) {
        return None;
    }

    let url = target.url.replacen(FUZZ_MARKER, FUZZ_VALUE, 1);

    let mut args = vec!["-u".to_string(), url];
    if let Some(data) = &data {
        args.push("--data".to_string());
        args.push(data.clone());
    }
    args.extend([
        "--batch".to_string(),
        "--stop".to_string(),
        format!("--level={}", options.level),
        format!("--risk={}", options.risk),
        format!("--threads={}", options.threads),
        Technique::from_flag(options.time_based).as_arg().to_string(),
        format!("--method={}", target.method()),
    ]);
    args.extend(header_args);

    Some(SqlmapCommand { args, data })
}

/// `a,b,c` -> `a=1*&b=test&c=test`
pub fn build_form_data(params: &str) -> String {
    param_names(params)
        .enumerate()
        .map(|(i, name)| format!("{}={}", name, param_value(i)))
        .collect::<Vec<_>>()
        .join("&")
}

/// `a,b` -> `{"a":"1*","b":"test"}`，键按字典序输出
pub fn build_json_data(params: &str) -> String {
    let mut object = Map::new();
    for (i, name) in param_names(params).enumerate() {
        object.insert(name.to_string(), Value::String(param_value(i).to_string()));
    }
    Value::Object(object).to_string()
}

fn param_names(params: &str) -> impl Iterator<Item = &str> {
    params.split(',').map(str::trim)
}

fn param_value(index: usize) -> &'static str {
    if index == 0 {
        FUZZ_VALUE
    } else {
        PROBE_VALUE
    }
}

// 排序只是为了日志可读，sqlmap 不关心请求头顺序
fn header_lines(target: &ScanTarget) -> Vec<String> {
    let mut headers: Vec<String> = target
        .headers
        .iter()
        .map(|(key, value)| format!("{}: {}", key, value))
        .collect();
    headers.sort();
    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn options() -> ScanOptions {
        ScanOptions {
            level: 3,
            risk: 2,
            threads: 4,
            time_based: false,
        }
    }

    #[test]
    fn form_params_first_gets_fuzz_value() {
        assert_eq!(build_form_data("a,b,c"), "a=1*&b=test&c=test");
        assert_eq!(build_form_data(" user , pass "), "user=1*&pass=test");
    }

    #[test]
    fn body_params_build_json_object() {
        assert_eq!(build_json_data("a,b"), r#"{"a":"1*","b":"test"}"#);
        let parsed: Value = serde_json::from_str(&build_json_data("id, name, email")).unwrap();
        assert_eq!(parsed["id"], "1*");
        assert_eq!(parsed["name"], "test");
        assert_eq!(parsed["email"], "test");
    }

    #[test]
    fn url_fuzz_marker_builds_full_argument_vector() {
        let target = ScanTarget {
            url: "http://target/item?id=FUZZ&ref=FUZZ".into(),
            http_method: "get".into(),
            ..ScanTarget::default()
        };

        let command = build_command(&target, &options()).unwrap();

        assert_eq!(command.data, None);
        assert_eq!(
            command.args,
            vec![
                "-u",
                "http://target/item?id=1*&ref=FUZZ",
                "--batch",
                "--stop",
                "--level=3",
                "--risk=2",
                "--threads=4",
                "--technique=BEUSQ",
                "--method=GET",
            ]
        );
    }

    #[test]
    fn body_params_add_data_and_content_type() {
        let mut target = ScanTarget {
            url: "http://target/api/login".into(),
            http_method: "post".into(),
            body_params: "user,pass".into(),
            form_params: "ignored".into(),
            ..ScanTarget::default()
        };
        target.headers.insert("X-Token".into(), "abc".into());
        target.headers.insert("Cookie".into(), "sid=1".into());

        let command = build_command(&target, &options()).unwrap();

        let data = r#"{"pass":"test","user":"1*"}"#;
        assert_eq!(command.data.as_deref(), Some(data));
        assert_eq!(&command.args[..4], &["-u", "http://target/api/login", "--data", data]);
        assert!(command.args.contains(&"--method=POST".to_string()));

        let headers: HashSet<&str> = command
            .args
            .iter()
            .filter(|arg| arg.starts_with("--headers="))
            .map(String::as_str)
            .collect();
        let expected: HashSet<&str> = [
            "--headers=X-Token: abc",
            "--headers=Cookie: sid=1",
            "--headers=Content-Type: application/json",
        ]
        .into_iter()
        .collect();
        assert_eq!(headers, expected);
    }

    #[test]
    fn form_params_use_form_body_without_content_type() {
        let target = ScanTarget {
            url: "http://target/search".into(),
            http_method: "post".into(),
            form_params: "q,page".into(),
            ..ScanTarget::default()
        };

        let command = build_command(&target, &options()).unwrap();

        assert_eq!(command.data.as_deref(), Some("q=1*&page=test"));
        assert!(!command.args.iter().any(|arg| arg.contains("Content-Type")));
    }

    #[test]
    fn time_based_flag_selects_time_technique() {
        let target = ScanTarget::new("http://target/?id=FUZZ");
        let mut opts = options();
        opts.time_based = true;

        let command = build_command(&target, &opts).unwrap();

        assert!(command.args.contains(&"--technique=BEUSTQ".to_string()));
        assert!(!command.args.contains(&"--technique=BEUSQ".to_string()));
    }

    #[test]
    fn target_without_params_or_marker_is_not_actionable() {
        let target = ScanTarget::new("http://target/static/page");
        assert!(build_command(&target, &options()).is_none());
    }
}
