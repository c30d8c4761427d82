//! Line-preserving `${NAME}` template substitutor.
//!
//! Used as a whole-stream preprocessor over both configuration tables and
//! by the `template_envsubst` initializer action. The accepted token form
//! is strict: `${NAME}` with `NAME` matching `[A-Za-z_][A-Za-z0-9_]*`.
//! `\$` produces a literal `$`; every other backslash passes through
//! verbatim. A bare `$` that is not followed by a complete `{NAME}` is a
//! syntax error, and referencing an unset variable is its own error kind.

use crate::error::IlfsError;

/// Substitution failures, with the component-level exit signals the
/// substitutor contract assigns them.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    /// Malformed input (bare `$`, bad name, unterminated reference).
    #[error("template syntax error: {detail}")]
    Syntax {
        /// What the scanner choked on.
        detail: String,
    },
    /// A referenced variable is not set.
    #[error("undefined variable: {name}")]
    Undefined {
        /// The unset variable name.
        name: String,
    },
}

impl TemplateError {
    /// Exit signal of the substitutor component: syntax errors signal 2,
    /// undefined variables signal 1.
    #[must_use]
    pub fn signal(&self) -> i32 {
        match self {
            TemplateError::Syntax { .. } => 2,
            TemplateError::Undefined { .. } => 1,
        }
    }
}

impl From<TemplateError> for IlfsError {
    fn from(err: TemplateError) -> Self {
        match err {
            TemplateError::Syntax { detail } => IlfsError::TemplateSyntax { detail },
            TemplateError::Undefined { name } => IlfsError::TemplateUndefined { name },
        }
    }
}

fn name_char(c: char, first: bool) -> bool {
    if first {
        c.is_ascii_alphabetic() || c == '_'
    } else {
        c.is_ascii_alphanumeric() || c == '_'
    }
}

/// Expand every `${NAME}` in `input` using `lookup`.
///
/// Empty variable values substitute to empty strings. Interior newlines
/// are preserved; non-empty input is emitted with exactly one trailing
/// newline. Substituted values are not rescanned.
pub fn substitute<F>(input: &str, lookup: F) -> Result<String, TemplateError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if chars.peek() == Some(&'$') {
                    chars.next();
                    out.push('$');
                } else {
                    out.push('\\');
                }
            }
            '$' => {
                if chars.next() != Some('{') {
                    return Err(TemplateError::Syntax {
                        detail: "'$' not followed by '{'".to_string(),
                    });
                }
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(ch) if name_char(ch, name.is_empty()) => name.push(ch),
                        Some(ch) => {
                            return Err(TemplateError::Syntax {
                                detail: format!("invalid character {ch:?} in variable name"),
                            });
                        }
                        None => {
                            return Err(TemplateError::Syntax {
                                detail: "unterminated variable reference".to_string(),
                            });
                        }
                    }
                }
                if name.is_empty() {
                    return Err(TemplateError::Syntax {
                        detail: "empty variable name".to_string(),
                    });
                }
                match lookup(&name) {
                    Some(value) => out.push_str(&value),
                    None => return Err(TemplateError::Undefined { name }),
                }
            }
            other => out.push(other),
        }
    }

    if !input.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    Ok(out)
}

/// [`substitute`] against the process environment.
pub fn substitute_env(input: &str) -> Result<String, TemplateError> {
    substitute(input, |name| std::env::var(name).ok())
}
