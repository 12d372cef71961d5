//! Output cleanup.

/// Turn the bytes received before the prompt line into caller text.
///
/// The echoed command line is dropped when the command shows up in it.
/// Within each line, a carriage return that is not part of a line ending
/// means the device rewrote the line (pager erasure, progress counters),
/// so only what follows the last one is kept.
pub(crate) fn clean_output(body: &str, command: &str) -> String {
    let command = command.trim();
    let mut lines = body.split('\n').peekable();

    if let Some(first) = lines.peek() {
        let echoed = if command.is_empty() {
            visible(first).trim().is_empty()
        } else {
            first.contains(command)
        };
        if echoed {
            lines.next();
        }
    }

    let lines: Vec<&str> = lines.map(visible).collect();
    let start = lines.iter().position(|l| !l.trim().is_empty());
    let end = lines.iter().rposition(|l| !l.trim().is_empty());
    match (start, end) {
        (Some(start), Some(end)) => lines[start..=end]
            .iter()
            .map(|l| l.trim_end())
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    }
}

/// What a terminal would show for one line.
fn visible(line: &str) -> &str {
    let line = line.trim_end_matches('\r');
    match line.rfind('\r') {
        Some(i) => &line[i + 1..],
        None => line,
    }
}
