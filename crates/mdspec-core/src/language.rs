//! Maps fenced-code languages to the program and arguments that run them.

/// Languages a standalone fenced block may be executed as.
const STANDALONE_LANGUAGES: [&str; 8] = ["bash", "shell", "sh", "python", "py", "typescript", "ts", "go"];

/// Whether a fenced block outside a `command:` block is executable.
#[must_use]
pub fn is_standalone_executable(language: &str) -> bool {
    STANDALONE_LANGUAGES.contains(&language)
}

/// Whether a fenced block inside a `command:` block carries block-local overrides.
#[must_use]
pub fn is_front_matter_fence(language: &str) -> bool {
    matches!(language, "frontmatter" | "yaml" | "yml")
}

/// Normalize a fence info string (`"Bash title=x"`) to its language (`"bash"`).
#[must_use]
pub fn fence_language(info: &str) -> String {
    info.split(|current: char| current.is_whitespace() || matches!(current, ',' | '{' | '}'))
        .find(|part| !part.is_empty())
        .unwrap_or_default()
        .trim_matches('.')
        .to_ascii_lowercase()
}

/// Program and arguments that execute a `command:` block's `content`.
///
/// Unknown languages are passed through unmodified: the language is the
/// program and the content its only argument.
#[must_use]
pub fn command_for(language: &str, content: &str) -> (String, Vec<String>) {
    let content = content.to_owned();
    match language {
        "bash" | "sh" => (language.to_owned(), vec!["-c".to_owned(), content]),
        "shell" => ("bash".to_owned(), vec!["-c".to_owned(), content]),
        "pwsh" | "powershell" => (language.to_owned(), vec!["-Command".to_owned(), content]),
        "python" | "python3" => (language.to_owned(), vec!["-c".to_owned(), content]),
        "typescript" | "ts" => ("tsx".to_owned(), vec!["-e".to_owned(), content]),
        "javascript" | "js" => ("node".to_owned(), vec!["-e".to_owned(), content]),
        other => (other.to_owned(), vec![content]),
    }
}

/// Program and arguments that execute a standalone fence.
///
/// Extends [`command_for`] so every language in the standalone set runs:
/// `py` goes to `python3` and `go` through a scratch `go run`.
#[must_use]
pub fn standalone_command_for(language: &str, content: &str) -> (String, Vec<String>) {
    match language {
        "py" => ("python3".to_owned(), vec!["-c".to_owned(), content.to_owned()]),
        "go" => ("bash".to_owned(), vec!["-c".to_owned(), go_run_script(content)]),
        other => command_for(other, content),
    }
}

/// Go has no `-e`; write the program to a scratch directory and `go run` it.
fn go_run_script(content: &str) -> String {
    format!(
        "set -e\nscratch=$(mktemp -d)\ntrap 'rm -rf \"$scratch\"' EXIT\ncat > \"$scratch/main.go\" <<'MDSPEC_GO_EOF'\n{content}\nMDSPEC_GO_EOF\ngo run \"$scratch/main.go\""
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fence_language() {
        assert_eq!(fence_language("Bash title=demo"), "bash");
        assert_eq!(fence_language("python,ignore"), "python");
        assert_eq!(fence_language("{.sh}"), "sh");
        assert_eq!(fence_language(""), "");
    }

    #[test]
    fn test_command_mapping() {
        assert_eq!(
            command_for("bash", "echo hi"),
            ("bash".to_owned(), vec!["-c".to_owned(), "echo hi".to_owned()])
        );
        assert_eq!(command_for("shell", "ls").0, "bash");
        assert_eq!(command_for("pwsh", "dir").1[0], "-Command");
        assert_eq!(command_for("python3", "print(1)").0, "python3");
        assert_eq!(command_for("ts", "1").0, "tsx");
        assert_eq!(command_for("js", "1"), ("node".to_owned(), vec!["-e".to_owned(), "1".to_owned()]));
        assert_eq!(command_for("ruby", "puts 1"), ("ruby".to_owned(), vec!["puts 1".to_owned()]));
    }

    #[test]
    fn test_command_blocks_pass_unlisted_languages_through() {
        assert_eq!(command_for("py", "print(1)"), ("py".to_owned(), vec!["print(1)".to_owned()]));
        assert_eq!(command_for("go", "main"), ("go".to_owned(), vec!["main".to_owned()]));
    }

    #[test]
    fn test_standalone_mapping() {
        assert_eq!(
            standalone_command_for("py", "print(1)"),
            ("python3".to_owned(), vec!["-c".to_owned(), "print(1)".to_owned()])
        );
        assert_eq!(standalone_command_for("bash", "ls").0, "bash");
        assert_eq!(standalone_command_for("ts", "1").0, "tsx");
    }

    #[test]
    fn test_go_uses_scratch_file() {
        let (program, args) = standalone_command_for("go", "package main\nfunc main() {}");
        assert_eq!(program, "bash");
        assert!(args[1].contains("go run"));
        assert!(args[1].contains("func main() {}"));
    }

    #[test]
    fn test_standalone_set() {
        assert!(is_standalone_executable("py"));
        assert!(is_standalone_executable("go"));
        assert!(!is_standalone_executable("javascript"));
        assert!(!is_standalone_executable("yaml"));
    }
}
