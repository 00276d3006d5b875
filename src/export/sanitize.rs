//! Filesystem-safe names for document ids.

/// Replace every character outside `[A-Za-z0-9_.-]` with `_` and collapse
/// runs of `.` into one, so `..` can never reach a path.
pub fn sanitize_file_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        let c = if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
            c
        } else {
            '_'
        };
        if c == '.' && out.ends_with('.') {
            continue;
        }
        out.push(c);
    }
    out
}

/// File name of the XML export for a document id
pub fn document_file_name(id: &str) -> String {
    format!("{}.xml", sanitize_file_name(id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_traversal_blocked() {
        let out = sanitize_file_name("abc/def..xml");
        assert_eq!(out, "abc_def.xml");
        assert!(!out.contains('/'));
        assert!(!out.contains(".."));
    }

    #[test]
    fn test_idempotent() {
        for input in ["abc/def..xml", "../../etc/passwd", "a b\tc", "x...y....z", "ünï-cødé"] {
            let once = sanitize_file_name(input);
            assert_eq!(sanitize_file_name(&once), once, "input {input:?}");
        }
    }

    #[test]
    fn test_allowed_characters_untouched() {
        assert_eq!(sanitize_file_name("ABCD-12345_node.7"), "ABCD-12345_node.7");
    }

    #[test]
    fn test_non_ascii_replaced_per_char() {
        assert_eq!(sanitize_file_name("é/ü"), "___");
    }

    #[test]
    fn test_document_file_name() {
        assert_eq!(document_file_name("qvt2ka/node/42"), "qvt2ka_node_42.xml");
    }
}
