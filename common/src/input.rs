/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use glob::Pattern;

pub fn greater_than_zero<
    T: std::str::FromStr + std::cmp::PartialOrd + std::fmt::Display + Default,
>(
    s: &str,
) -> Result<T, String> {
    let num: T = s
        .parse()
        .map_err(|_| format!("`{}` is not a valid number", s))?;

    if num > T::default() {
        Ok(num)
    } else {
        Err(format!("`{}` is not larger than 0", s))
    }
}

pub fn vec_to_hex(v: &[u8]) -> String {
    v.iter().map(|b| format!("{:02x}", b)).collect()
}

pub fn check_branch_glob(s: &str) -> Result<Pattern, String> {
    if s.trim().is_empty() {
        return Err("Branch glob cannot be empty".to_string());
    }

    if s.trim() != s {
        return Err("Branch glob cannot have leading or trailing whitespace".to_string());
    }

    Pattern::new(s).map_err(|e| format!("Invalid branch glob `{}`: {}", s, e))
}

/// Matches a branch against a glob, treating an invalid glob as a literal branch name.
pub fn branch_matches_glob(glob: &str, branch: &str) -> bool {
    match check_branch_glob(glob) {
        Ok(pattern) => pattern.matches(branch),
        Err(_) => glob == branch,
    }
}

pub fn check_commit_sha(s: &str) -> Result<(), String> {
    if s.len() != 40 {
        return Err("commit hash must be 40 characters long".to_string());
    }

    if !s.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err("commit hash must be hexadecimal".to_string());
    }

    Ok(())
}
