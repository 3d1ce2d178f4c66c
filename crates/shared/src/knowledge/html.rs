use super::collapse_whitespace;

/// Container elements whose contents are boilerplate rather than knowledge.
const DROPPED_CONTAINERS: [&str; 6] = ["script", "style", "nav", "header", "footer", "aside"];

/// Reduces an HTML document to plain text: dropped containers disappear with
/// their contents, every other tag becomes a word boundary, a handful of
/// common entities are decoded and whitespace is collapsed.
pub(crate) fn strip_html(input: &str) -> String {
    let without_blocks = drop_container_blocks(input);
    let without_tags = drop_remaining_tags(&without_blocks);
    collapse_whitespace(&decode_basic_entities(&without_tags))
}

fn drop_container_blocks(input: &str) -> String {
    // Searching over an ASCII-lowercased copy keeps byte offsets valid for
    // slicing the original.
    let lower = input.to_ascii_lowercase();
    let mut out = String::with_capacity(input.len());
    let mut pos = 0;

    while pos < input.len() {
        let Some((start, tag)) = next_dropped_open(&lower, pos) else {
            out.push_str(&input[pos..]);
            break;
        };
        out.push_str(&input[pos..start]);

        let close = format!("</{tag}");
        pos = match lower[start..].find(&close) {
            Some(rel) => {
                let close_start = start + rel;
                match lower[close_start..].find('>') {
                    Some(gt) => close_start + gt + 1,
                    None => input.len(),
                }
            }
            // Unterminated container: everything that follows is suspect.
            None => input.len(),
        };
    }

    out
}

fn next_dropped_open(lower: &str, from: usize) -> Option<(usize, &'static str)> {
    let mut earliest: Option<(usize, &'static str)> = None;

    for tag in DROPPED_CONTAINERS {
        let needle = format!("<{tag}");
        let mut search = from;
        while let Some(rel) = lower[search..].find(&needle) {
            let start = search + rel;
            let after = lower.as_bytes().get(start + needle.len());
            let is_tag_boundary = matches!(
                after,
                None | Some(b'>') | Some(b'/') | Some(b' ') | Some(b'\t') | Some(b'\n') | Some(b'\r')
            );
            if is_tag_boundary {
                if earliest.is_none_or(|(best, _)| start < best) {
                    earliest = Some((start, tag));
                }
                break;
            }
            search = start + 1;
        }
    }

    earliest
}

fn drop_remaining_tags(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.char_indices().peekable();

    while let Some((idx, ch)) = chars.next() {
        if ch != '<' {
            out.push(ch);
            continue;
        }
        let looks_like_tag = input[idx + 1..]
            .chars()
            .next()
            .is_some_and(|next| next.is_ascii_alphabetic() || matches!(next, '/' | '!' | '?'));
        if !looks_like_tag {
            out.push(ch);
            continue;
        }
        // Replace the whole tag with a space so adjacent words stay apart.
        for (_, inner) in chars.by_ref() {
            if inner == '>' {
                break;
            }
        }
        out.push(' ');
    }

    out
}

fn decode_basic_entities(input: &str) -> String {
    input
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
