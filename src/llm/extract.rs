const FENCE: &str = "```";
const CLOSING_FENCE: &str = "\n```";

/// Returns the trimmed body of the first fenced code block tagged `sql`.
///
/// An opening fence is three backticks followed by a tag on the same line; the
/// block ends at the next line that starts with three backticks. Blocks with any
/// other tag are skipped, as is everything outside the fence. `None` when there is
/// no such block, it is never closed, or its body is blank.
pub fn extract_sql_block(response: &str) -> Option<String> {
    let mut cursor = 0;

    while let Some(offset) = response[cursor..].find(FENCE) {
        let tag_start = cursor + offset + FENCE.len();
        let line_end = match response[tag_start..].find('\n') {
            Some(i) => tag_start + i,
            None => return None,
        };

        if response[tag_start..line_end].trim() == "sql" {
            // Body starts right after the opening line's newline; the closing
            // search includes that newline so an empty body still closes.
            let body_start = line_end + 1;
            let body_end = line_end + response[line_end..].find(CLOSING_FENCE)?;
            let body = if body_end > body_start {
                response[body_start..body_end].trim()
            } else {
                ""
            };
            return (!body.is_empty()).then(|| body.to_string());
        }

        cursor = tag_start;
    }

    None
}
