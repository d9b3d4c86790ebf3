/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

/// Share of lines that differ between two text files, 0 when equal and 1 when nothing matches.
pub fn diff_text(base: &[u8], head: &[u8]) -> f64 {
    let base = String::from_utf8_lossy(base);
    let head = String::from_utf8_lossy(head);

    let base: Vec<&str> = base.lines().collect();
    let head: Vec<&str> = head.lines().collect();

    let total = base.len() + head.len();
    if total == 0 {
        return 0.0;
    }

    let common = longest_common_lines(&base, &head);
    1.0 - (2 * common) as f64 / total as f64
}

fn longest_common_lines(a: &[&str], b: &[&str]) -> usize {
    let mut previous = vec![0usize; b.len() + 1];
    let mut current = vec![0usize; b.len() + 1];

    for line in a {
        for (j, other) in b.iter().enumerate() {
            current[j + 1] = if line == other {
                previous[j] + 1
            } else {
                previous[j + 1].max(current[j])
            };
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b.len()]
}
