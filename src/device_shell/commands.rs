//! Shell command lines understood by the board's busybox userland.

/// `-e` is rejected by busybox `ps`, which already lists every process.
pub const PROCESS_LIST: &str = "ps -e -o pid,args 2>/dev/null || ps -o pid,args 2>/dev/null || ps";

/// Single quotes `value` for a POSIX shell.
pub fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Kill-by-name from gentle to forced. Each step exits non-zero when there
/// was nothing left to kill.
pub fn kill_escalation(name: &str) -> Vec<String> {
    let pattern = quote(&self_excluding_pattern(name));
    vec![
        format!("killall {}", quote(name)),
        format!("pkill -f {}", pattern),
        format!("pkill -9 -f {}", pattern),
    ]
}

/// `sample_vi_fd` becomes `[s]ample_vi_fd`: the regex still matches the
/// program, but no longer the `sh -c` wrapper whose command line carries it.
pub fn self_excluding_pattern(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphanumeric() => format!("[{}]{}", first, chars.as_str()),
        _ => name.to_string(),
    }
}

pub fn force_kill(pid: u32) -> String {
    format!("kill -9 {}", pid)
}

pub fn script_exists(path: &str) -> String {
    format!("ls -la {}", quote(path))
}

pub fn make_executable(path: &str) -> String {
    format!("chmod +x {}", quote(path))
}

/// Pids of every `ps` line mentioning `name`. Header lines and our own
/// `grep` helpers are skipped.
pub fn parse_process_list(output: &str, name: &str) -> Vec<u32> {
    let mut pids: Vec<u32> = output
        .lines()
        .filter(|line| line.contains(name) && !line.contains("grep"))
        .filter_map(|line| line.split_whitespace().next()?.parse().ok())
        .collect();
    pids.sort_unstable();
    pids.dedup();
    pids
}
