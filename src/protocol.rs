//! The compile-then-run script executed inside the container and the markers
//! it prints around each captured stream.
//!
//! Output layout, in order:
//!
//! ```text
//! ---COMPILE_STDOUT_START---
//! <rustc stdout>
//! ---COMPILE_STDOUT_END---
//! ---COMPILE_STDERR_START---
//! <rustc stderr>
//! ---COMPILE_STDERR_END---
//! ---RUN_STDOUT_START---          (only when rustc exited 0)
//! <program stdout>
//! ---RUN_STDOUT_END---
//! ---RUN_STDERR_START---
//! <program stderr>
//! ---RUN_STDERR_END---
//! ---EXIT_CODE---{<compile>:<run>}   (<run> is -1 when the program was not run)
//! ```

pub const SOURCE_FILE: &str = "main.rs";
pub const ARTIFACT: &str = "main_exec";

/// Start and end sentinels around one captured stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Section {
    pub start: &'static str,
    pub end: &'static str,
}

pub const COMPILE_STDOUT: Section = Section {
    start: "---COMPILE_STDOUT_START---",
    end: "---COMPILE_STDOUT_END---",
};

pub const COMPILE_STDERR: Section = Section {
    start: "---COMPILE_STDERR_START---",
    end: "---COMPILE_STDERR_END---",
};

pub const RUN_STDOUT: Section = Section {
    start: "---RUN_STDOUT_START---",
    end: "---RUN_STDOUT_END---",
};

pub const RUN_STDERR: Section = Section {
    start: "---RUN_STDERR_START---",
    end: "---RUN_STDERR_END---",
};

pub const EXIT_CODE_OPEN: &str = "---EXIT_CODE---{";
pub const EXIT_CODE_CLOSE: char = '}';

/// Wire value of the run exit code when the program was never started.
pub const NOT_ATTEMPTED: i32 = -1;

// `{source}` and `{artifact}` are filled in by `script()`. Side files live in
// the container's `/tmp`, never in the bind-mounted workspace.
const SCRIPT_TEMPLATE: &str = r#"
echo "---COMPILE_STDOUT_START---"
rustc {source} -o {artifact} 2> /tmp/compile.stderr
COMPILE_EXIT_CODE=$?
echo "---COMPILE_STDOUT_END---"

echo "---COMPILE_STDERR_START---"
cat /tmp/compile.stderr || echo ""
echo "---COMPILE_STDERR_END---"

RUN_EXIT_CODE=-1
if [ $COMPILE_EXIT_CODE -eq 0 ]; then
    echo "---RUN_STDOUT_START---"
    ./{artifact} 2> /tmp/run.stderr
    RUN_EXIT_CODE=$?
    echo "---RUN_STDOUT_END---"

    echo "---RUN_STDERR_START---"
    cat /tmp/run.stderr || echo ""
    echo "---RUN_STDERR_END---"
fi

echo "---EXIT_CODE---{$COMPILE_EXIT_CODE:$RUN_EXIT_CODE}"
"#;

/// Shell program run by `/bin/sh -c` inside the container.
pub fn script() -> String {
    SCRIPT_TEMPLATE
        .replace("{source}", SOURCE_FILE)
        .replace("{artifact}", ARTIFACT)
}

/// Full container command line.
pub fn command() -> Vec<String> {
    vec!["/bin/sh".to_string(), "-c".to_string(), script()]
}
