//! Shell script rendering of a reconciliation plan.
//!
//! The script is meant to be read before it is run. Every mutating line is
//! preceded by an `echo` describing it, the script stops at the first
//! failing command (`set -e`), and every path is single-quoted so spaces,
//! `$`, backticks and quotes in file names are inert. Paths are written as
//! raw bytes, so use [`ScriptOutput::write_to`] rather than
//! [`ScriptOutput::render`] when names may not be UTF-8.
//!
//! # Usage
//!
//! ```rust,ignore
//! use dupsort::output::script::ScriptOutput;
//!
//! let output = ScriptOutput::new(&actions, ReconcileMode::Hardlink);
//! output.write_to(&mut std::io::stdout()).unwrap();
//! ```

use std::borrow::Cow;
use std::io::{self, Write};
use std::path::Path;

use crate::actions::{LinkKind, ReconcileMode, ReconciliationAction};

/// Formatter for POSIX shell script output.
pub struct ScriptOutput<'a> {
    /// Actions in execution order
    pub actions: &'a [ReconciliationAction],
    /// Mode the plan was built with
    pub mode: ReconcileMode,
}

impl<'a> ScriptOutput<'a> {
    /// Create a new script output formatter.
    #[must_use]
    pub fn new(actions: &'a [ReconciliationAction], mode: ReconcileMode) -> Self {
        Self { actions, mode }
    }

    /// Write the generated script to a writer.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writeln!(writer, "#! /bin/bash")?;
        writeln!(writer, "# dupsort reconciliation script ({})", self.mode)?;
        writeln!(
            writer,
            "# Generated on: {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        )?;
        let mutating = self.actions.iter().filter(|a| a.is_mutating()).count();
        if mutating > 0 {
            writeln!(writer, "#")?;
            writeln!(
                writer,
                "# WARNING: this script changes {} file(s). Review it before running.",
                mutating
            )?;
        }
        writeln!(writer, "set -e")?;

        for action in self.actions {
            write_action(writer, action)?;
        }
        Ok(())
    }

    /// Render the script into a string.
    #[must_use]
    pub fn render(&self) -> String {
        let mut buf = Vec::new();
        // Writing into a Vec cannot fail.
        let _ = self.write_to(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    }
}

fn write_action<W: Write>(writer: &mut W, action: &ReconciliationAction) -> io::Result<()> {
    match action {
        ReconciliationAction::Announce { path } => {
            writer.write_all(b"echo ")?;
            write_quoted(writer, &path_bytes(path))?;
            writer.write_all(b"\n")?;
        }
        ReconciliationAction::Remove { path } => {
            let path = path_bytes(path);
            let message = [&b"Deleting... "[..], &path[..]].concat();
            writer.write_all(b"echo ")?;
            write_quoted(writer, &message)?;
            writer.write_all(b"\nrm -f ")?;
            write_quoted(writer, &path)?;
            writer.write_all(b"\n")?;
        }
        ReconciliationAction::Link {
            kind,
            canonical,
            duplicate,
        } => {
            let (verb, command) = match kind {
                LinkKind::Soft => ("Soft linking", "ln -sf"),
                LinkKind::Hard => ("Hard linking", "ln -f"),
                LinkKind::Reflink => ("Reflinking", "cp --reflink=always"),
            };
            let canonical = path_bytes(canonical);
            let duplicate = path_bytes(duplicate);
            let message = [
                verb.as_bytes(),
                &b" "[..],
                &canonical[..],
                &b" ==> "[..],
                &duplicate[..],
            ]
            .concat();
            writer.write_all(b"echo ")?;
            write_quoted(writer, &message)?;
            write!(writer, "\n{} ", command)?;
            write_quoted(writer, &canonical)?;
            writer.write_all(b" ")?;
            write_quoted(writer, &duplicate)?;
            writer.write_all(b"\n")?;
        }
    }
    Ok(())
}

// Paths go into the script byte for byte so names that are not UTF-8
// still address the right file.
#[cfg(unix)]
fn path_bytes(path: &Path) -> Cow<'_, [u8]> {
    use std::os::unix::ffi::OsStrExt;
    Cow::Borrowed(path.as_os_str().as_bytes())
}

#[cfg(not(unix))]
fn path_bytes(path: &Path) -> Cow<'_, [u8]> {
    match path.to_string_lossy() {
        Cow::Borrowed(s) => Cow::Borrowed(s.as_bytes()),
        Cow::Owned(s) => Cow::Owned(s.into_bytes()),
    }
}

fn write_quoted<W: Write>(writer: &mut W, bytes: &[u8]) -> io::Result<()> {
    writer.write_all(b"'")?;
    for (i, part) in bytes.split(|&b| b == b'\'').enumerate() {
        if i > 0 {
            writer.write_all(b"'\\''")?;
        }
        writer.write_all(part)?;
    }
    writer.write_all(b"'")
}

/// Single-quote `s` for a POSIX shell, writing `'` as `'\''`.
#[must_use]
pub fn escape_posix(s: &str) -> String {
    let mut buf = Vec::with_capacity(s.len() + 2);
    // Writing into a Vec cannot fail.
    let _ = write_quoted(&mut buf, s.as_bytes());
    String::from_utf8_lossy(&buf).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_escape_posix() {
        assert_eq!(escape_posix("/foo/bar.txt"), "'/foo/bar.txt'");
        assert_eq!(escape_posix("/foo's/bar.txt"), "'/foo'\\''s/bar.txt'");
        assert_eq!(escape_posix("/foo bar/baz.txt"), "'/foo bar/baz.txt'");
        assert_eq!(escape_posix("/foo$bar/`baz`.txt"), "'/foo$bar/`baz`.txt'");
    }

    #[test]
    fn test_script_header() {
        let script = ScriptOutput::new(&[], ReconcileMode::Check).render();
        assert!(script.starts_with("#! /bin/bash\n"));
        assert!(script.contains("set -e\n"));
        assert!(script.contains("(check)"));
        assert!(!script.contains("WARNING"));
    }

    #[test]
    fn test_script_announce() {
        let actions = vec![ReconciliationAction::Announce {
            path: PathBuf::from("/p/a.jpg"),
        }];
        let script = ScriptOutput::new(&actions, ReconcileMode::Check).render();
        assert!(script.ends_with("echo '/p/a.jpg'\n"));
    }

    #[test]
    fn test_script_delete() {
        let actions = vec![ReconciliationAction::Remove {
            path: PathBuf::from("/p/it's.jpg"),
        }];
        let script = ScriptOutput::new(&actions, ReconcileMode::Delete).render();
        assert!(script.contains("echo 'Deleting... /p/it'\\''s.jpg'\n"));
        assert!(script.contains("rm -f '/p/it'\\''s.jpg'\n"));
        assert!(script.contains("changes 1 file(s)"));
    }

    #[test]
    fn test_script_link_commands() {
        let cases = [
            (LinkKind::Soft, "ln -sf '/p/a' '/p/b'"),
            (LinkKind::Hard, "ln -f '/p/a' '/p/b'"),
            (LinkKind::Reflink, "cp --reflink=always '/p/a' '/p/b'"),
        ];
        for (kind, expected) in cases {
            let actions = vec![ReconciliationAction::Link {
                kind,
                canonical: PathBuf::from("/p/a"),
                duplicate: PathBuf::from("/p/b"),
            }];
            let script = ScriptOutput::new(&actions, ReconcileMode::Hardlink).render();
            assert!(script.contains(expected), "missing {expected} in {script}");
            assert!(script.contains("==> /p/b'"));
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_script_keeps_non_utf8_path_bytes() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let name = OsStr::from_bytes(b"\xffphoto's.jpg");
        let actions = vec![ReconciliationAction::Link {
            kind: LinkKind::Hard,
            canonical: Path::new("/a").join(name),
            duplicate: Path::new("/b").join(name),
        }];
        let mut buf = Vec::new();
        ScriptOutput::new(&actions, ReconcileMode::Hardlink)
            .write_to(&mut buf)
            .unwrap();

        let expected: &[u8] = b"ln -f '/a/\xffphoto'\\''s.jpg' '/b/\xffphoto'\\''s.jpg'\n";
        assert!(buf.windows(expected.len()).any(|w| w == expected));
    }
}
