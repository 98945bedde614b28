//! Structural source checks standing in for a device compiler

use crate::error::{BackendError, Result};
use vexel_codegen::DeviceProfile;

fn is_ident(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Strip `//` line comments.
fn code_lines(source: &str) -> impl Iterator<Item = &str> {
    source.lines().map(|line| match line.find("//") {
        Some(at) => &line[..at],
        None => line,
    })
}

fn check_balanced(module: &str, source: &str) -> Result<()> {
    let mut stack = Vec::new();
    for (number, line) in code_lines(source).enumerate() {
        for c in line.chars() {
            match c {
                '{' | '(' | '[' => stack.push(c),
                '}' | ')' | ']' => {
                    let expected = match c {
                        '}' => '{',
                        ')' => '(',
                        _ => '[',
                    };
                    if stack.pop() != Some(expected) {
                        return Err(BackendError::compilation(
                            module,
                            format!("line {}: unbalanced `{c}`", number + 1),
                        ));
                    }
                }
                _ => {}
            }
        }
    }
    match stack.last() {
        Some(open) => Err(BackendError::compilation(module, format!("unclosed `{open}`"))),
        None => Ok(()),
    }
}

/// Names of `__kernel` functions, in definition order.
fn entry_points(module: &str, source: &str) -> Result<Vec<String>> {
    let mut names: Vec<String> = Vec::new();
    let mut rest = source;
    while let Some(at) = rest.find("__kernel") {
        rest = &rest[at + "__kernel".len()..];
        let void_at = rest
            .find("void ")
            .ok_or_else(|| BackendError::compilation(module, "`__kernel` without a `void` function"))?;
        let after = &rest[void_at + "void ".len()..];
        let name: String = after.chars().take_while(|&c| is_ident(c)).collect();
        if name.is_empty() {
            return Err(BackendError::compilation(module, "unnamed kernel"));
        }
        if names.contains(&name) {
            return Err(BackendError::compilation(module, format!("kernel `{name}` defined twice")));
        }
        names.push(name);
        rest = after;
    }
    if names.is_empty() {
        return Err(BackendError::compilation(module, "source defines no kernels"));
    }
    Ok(names)
}

/// Byte offset of the first `double` / `doubleN` token.
fn first_double(source: &str) -> Option<usize> {
    source.match_indices("double").map(|(at, _)| at).find(|&at| {
        let before = source[..at].chars().next_back();
        let after = source[at + "double".len()..].chars().next();
        !before.is_some_and(is_ident) && !after.is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
    })
}

fn check_double(module: &str, source: &str, device: &DeviceProfile) -> Result<()> {
    let Some(used_at) = first_double(source) else {
        return Ok(());
    };
    let Some(extension) = &device.double_extension else {
        return Err(BackendError::compilation(
            module,
            format!("`double` used but device `{}` has no fp64 extension", device.name),
        ));
    };
    let pragma = format!("#pragma OPENCL EXTENSION {extension} : enable");
    match source.find(&pragma) {
        Some(at) if at < used_at => Ok(()),
        _ => Err(BackendError::compilation(
            module,
            format!("`double` used before `{pragma}`"),
        )),
    }
}

/// Validate `source` for `device` and return its entry points.
pub(crate) fn check_source(module: &str, source: &str, device: &DeviceProfile) -> Result<Vec<String>> {
    check_balanced(module, source)?;
    check_double(module, source, device)?;
    entry_points(module, source)
}
