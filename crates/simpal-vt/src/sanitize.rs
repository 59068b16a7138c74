use once_cell::sync::Lazy;
use regex::Regex;

const ESC: char = '\x1b';

/// Every escape sequence class simpal removes, tried left to right at each ESC.
///
/// 1. two-byte escapes: ESC + one final byte (Fp `0-?` and Fe/Fs `@-~`,
///    except `[` and `]`, which open CSI and OSC)
/// 2. nF escapes: ESC + intermediates (` -/`) + final, e.g. `ESC ( B`
/// 3. CSI: ESC `[` params `0-?` intermediates ` -/` final `@-~`
/// 4. OSC: ESC `]` optional digit `;` text, ended by BEL or ST (`ESC \`)
/// 5. a lone ESC that starts none of the above
static ESCAPE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"\x1b[0-?\x40-\x5A\x5C\x5E\x5F\x60-\x7E]",
        r"|\x1b[ -/]+[0-~]",
        r"|\x1b\[[0-?]*[ -/]*[@-~]",
        r"|\x1b\][0-9]?;[^\x1b\x07]*(?:\x07|\x1b\\)?",
        r"|\x1b",
    ))
    .expect("escape pattern is valid")
});

/// Returns `true` if `text` contains an ESC character.
pub fn contains_escape(text: &str) -> bool {
    text.contains(ESC)
}

/// Strip ANSI/VT control sequences from a single line of output.
///
/// Text outside escape sequences is returned unchanged and in order. The
/// result never contains ESC, so sanitizing twice is the same as once.
pub fn sanitize(line: &str) -> String {
    if !contains_escape(line) {
        return line.to_string();
    }
    ESCAPE_PATTERN.replace_all(line, "").into_owned()
}
