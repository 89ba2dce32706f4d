// src/exec/script.rs

//! Assembly of the final command line from interpreter and script lines.

/// Default interpreter prefix: a POSIX shell reading the script from `-c`.
pub const DEFAULT_INTERPRETER: [&str; 2] = ["/bin/sh", "-c"];

pub fn default_interpreter() -> Vec<String> {
    DEFAULT_INTERPRETER.iter().map(|s| s.to_string()).collect()
}

/// `interpreter + [before ++ commands joined by newlines]`.
///
/// Before-commands end up in the same script as the commands, so anything
/// they set up (`set -e`, exported variables, `cd`) applies to the commands.
pub fn script_commands(interpreter: &[String], before: &[String], commands: &[String]) -> Vec<String> {
    let script = before
        .iter()
        .chain(commands)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join("\n");

    let mut line = interpreter.to_vec();
    line.push(script);
    line
}

/// Invocation of a script file with `launcher` (e.g. `python3 main.py`).
pub fn launch_script(launcher: &str, script_path: &str) -> String {
    format!("{launcher} {}", shell_quote(script_path))
}

fn shell_quote(s: &str) -> String {
    if !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "/._-+=:@".contains(c))
    {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', r"'\''"))
    }
}
