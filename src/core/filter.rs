//! 排除规则（glob patterns）

use regex::Regex;

/// 编译后的排除规则
#[derive(Debug, Clone, Default)]
pub struct ExcludeFilter {
    patterns: Vec<Regex>,
}

impl ExcludeFilter {
    pub fn new(patterns: &[String]) -> Result<Self, regex::Error> {
        let patterns = patterns
            .iter()
            .map(|p| Regex::new(&Self::glob_to_regex(p)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// 检查相对路径是否应该被排除
    pub fn is_excluded(&self, path: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(path))
    }

    /// 把 glob 转成正则
    ///
    /// `**` 跨目录匹配，`*` 和 `?` 不跨 `/`。不含 `/` 的规则匹配任意层级的文件名。
    fn glob_to_regex(pattern: &str) -> String {
        let pattern = pattern.trim_start_matches('/');
        let mut out = String::from("^");
        if !pattern.contains('/') {
            out.push_str("(?:.*/)?");
        }

        let mut chars = pattern.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '*' if chars.peek() == Some(&'*') => {
                    chars.next();
                    if chars.peek() == Some(&'/') {
                        chars.next();
                        out.push_str("(?:.*/)?");
                    } else {
                        out.push_str(".*");
                    }
                }
                '*' => out.push_str("[^/]*"),
                '?' => out.push_str("[^/]"),
                other => out.push_str(&regex::escape(&other.to_string())),
            }
        }

        out.push('$');
        out
    }
}
