//! Fixed-width row layout helpers.
//!
//! All widths are counted in `char`s; the LCD character ROM is ASCII so
//! that matches what the glass shows.

/// Truncate to `cols` and right-pad with spaces to exactly `cols`.
#[must_use]
pub fn fit(text: &str, cols: usize) -> String {
    let mut out: String = text.chars().take(cols).collect();
    let len = out.chars().count();
    out.extend(std::iter::repeat_n(' ', cols - len));
    out
}

/// Center `text` in `cols`. When the padding is odd the left side gets the
/// extra space. Text at least `cols` wide is truncated.
#[must_use]
pub fn center(text: &str, cols: usize) -> String {
    let len = text.chars().count();
    if len >= cols {
        return text.chars().take(cols).collect();
    }
    let padding = cols - len;
    let left = padding.div_ceil(2);
    let right = padding - left;
    format!("{}{text}{}", " ".repeat(left), " ".repeat(right))
}

/// `left` flush left, `right` flush right. Without room for a single space
/// the two are concatenated.
#[must_use]
pub fn justify2(left: &str, right: &str, cols: usize) -> String {
    let used = left.chars().count() + right.chars().count();
    if used >= cols {
        return format!("{left}{right}");
    }
    format!("{left}{}{right}", " ".repeat(cols - used))
}

/// Three words spread across the row; the second gap takes the odd space.
/// Without room for two spaces the words are concatenated.
#[must_use]
pub fn justify3(first: &str, second: &str, third: &str, cols: usize) -> String {
    let used = first.chars().count() + second.chars().count() + third.chars().count();
    if used + 2 > cols {
        return format!("{first}{second}{third}");
    }
    let spaces = cols - used;
    let gap1 = spaces / 2;
    let gap2 = spaces - gap1;
    format!(
        "{first}{}{second}{}{third}",
        " ".repeat(gap1),
        " ".repeat(gap2)
    )
}

/// The rightmost `cols` characters of `buf`.
#[must_use]
pub fn trailing_window(buf: &str, cols: usize) -> &str {
    let len = buf.chars().count();
    if len <= cols {
        return buf;
    }
    let skip = len - cols;
    let start = buf.char_indices().nth(skip).map_or(buf.len(), |(idx, _)| idx);
    &buf[start..]
}

/// Frames for scrolling `text` across one row, left to right.
///
/// Text that fits yields a single frame.
#[must_use]
pub fn scroll_frames(text: &str, cols: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= cols {
        return vec![text.to_string()];
    }
    chars
        .windows(cols)
        .map(|window| window.iter().collect())
        .collect()
}
