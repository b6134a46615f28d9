//! Shard name templates.
//!
//! Object stores keep sharded datasets under names like `train-{0..3}.tar.xz`.
//! [`expand`] turns such a template into the list of concrete object names.

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unclosed brace range in template `{0}`")]
    Unclosed(String),

    #[error("malformed brace range `{{{0}}}`, expected `{{start..end}}`")]
    Malformed(String),

    #[error("range bound `{0}` is not a non-negative integer")]
    Bound(String),

    #[error("descending range `{{{start}..{end}}}`")]
    Descending { start: u64, end: u64 },
}

/// Expands brace ranges of the form `{start..end}` (inclusive) into one name
/// per integer. A bound written with leading zeros pads every expanded number
/// to that width, so `x-{000..095}.tar` yields `x-000.tar` through
/// `x-095.tar`. Multiple ranges expand as a cross product, left to right.
///
/// A template without a range expands to itself.
pub fn expand(template: &str) -> Result<Vec<String>, TemplateError> {
    let Some(start) = template.find('{') else {
        return Ok(vec![template.to_string()]);
    };
    let end = template[start..]
        .find('}')
        .map(|i| i + start)
        .ok_or_else(|| TemplateError::Unclosed(template.to_string()))?;

    let body = &template[start + 1..end];
    let (lo, hi) = body
        .split_once("..")
        .ok_or_else(|| TemplateError::Malformed(body.to_string()))?;

    let width = if lo.len() > 1 && lo.starts_with('0') {
        lo.len()
    } else {
        0
    };
    let lo: u64 = lo
        .parse()
        .map_err(|_| TemplateError::Bound(lo.to_string()))?;
    let hi: u64 = hi
        .parse()
        .map_err(|_| TemplateError::Bound(hi.to_string()))?;
    if hi < lo {
        return Err(TemplateError::Descending { start: lo, end: hi });
    }

    let prefix = &template[..start];
    let suffix = &template[end + 1..];
    let mut names = Vec::with_capacity((hi - lo + 1) as usize);
    for i in lo..=hi {
        // Later ranges in the suffix are handled by the recursive call.
        names.extend(expand(&format!("{prefix}{i:0width$}{suffix}"))?);
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_simple_range() {
        assert_eq!(
            expand("train-{0..3}.tar.xz").unwrap(),
            vec![
                "train-0.tar.xz",
                "train-1.tar.xz",
                "train-2.tar.xz",
                "train-3.tar.xz"
            ]
        );
    }

    #[test]
    fn keeps_zero_padding() {
        assert_eq!(
            expand("shard-{008..010}.tar").unwrap(),
            vec!["shard-008.tar", "shard-009.tar", "shard-010.tar"]
        );
    }

    #[test]
    fn no_range_is_a_single_object() {
        assert_eq!(expand("train-0.tar.xz").unwrap(), vec!["train-0.tar.xz"]);
    }

    #[test]
    fn multiple_ranges_cross_product() {
        assert_eq!(
            expand("{0..1}-{0..1}.tar").unwrap(),
            vec!["0-0.tar", "0-1.tar", "1-0.tar", "1-1.tar"]
        );
    }

    #[test]
    fn single_element_range() {
        assert_eq!(expand("a-{5..5}.tar").unwrap(), vec!["a-5.tar"]);
    }

    #[test]
    fn rejects_descending_range() {
        assert_eq!(
            expand("a-{3..0}.tar"),
            Err(TemplateError::Descending { start: 3, end: 0 })
        );
    }

    #[test]
    fn rejects_unclosed_brace() {
        assert!(matches!(
            expand("a-{0..3.tar"),
            Err(TemplateError::Unclosed(_))
        ));
    }

    #[test]
    fn rejects_missing_separator() {
        assert!(matches!(
            expand("a-{03}.tar"),
            Err(TemplateError::Malformed(_))
        ));
    }

    #[test]
    fn rejects_non_numeric_bound() {
        assert!(matches!(expand("a-{x..3}.tar"), Err(TemplateError::Bound(_))));
    }
}
