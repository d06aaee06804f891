//! Line splitting for the structure script grammar.
//!
//! A line is `target = chain` and the chain is dot-delimited:
//!
//! _Opti,AVOIDANCE=PTV.Ring(5,20).CropOut(Body,3)
//!
//! Token 0 of the chain is the base structure reference (a bare id);
//! every following token is an operator invocation `Name(arg,arg,...)`.
//! The caller strips whitespace and filters comments before this runs.

use crate::error::{Result, ScriptError};

/// A raw operator invocation: name plus ordered, unparsed arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpToken {
    pub name: String,
    pub args: Vec<String>,
}

/// Split a line on the first '=' into target spec and operator chain.
pub fn split_line(line: &str) -> Result<(&str, &str)> {
    let (target, chain) = line
        .split_once('=')
        .ok_or_else(|| ScriptError::syntax("expected 'target = chain'"))?;
    let (target, chain) = (target.trim(), chain.trim());
    if target.is_empty() {
        return Err(ScriptError::syntax("empty target spec before '='"));
    }
    if chain.is_empty() {
        return Err(ScriptError::syntax("empty operator chain after '='"));
    }
    Ok((target, chain))
}

/// Split the chain into the base structure reference and operator tokens.
pub fn split_chain(chain: &str) -> Result<(String, Vec<OpToken>)> {
    let mut tokens = chain.split('.');

    let base = tokens.next().unwrap_or_default();
    if base.is_empty() || base.contains('(') || base.contains(')') {
        return Err(ScriptError::syntax(format!(
            "chain must start with a bare structure reference, got '{base}'"
        )));
    }

    let mut ops = Vec::new();
    for token in tokens {
        ops.push(split_op_token(token)?);
    }
    Ok((base.to_string(), ops))
}

/// Split `Ring(5,20)` into name "Ring" and args ["5","20"].
///
/// A bare name (`HighRes`) or an empty pair (`HighRes()`) both yield an
/// empty argument list.
pub fn split_op_token(token: &str) -> Result<OpToken> {
    let Some((name, rest)) = token.split_once('(') else {
        if token.is_empty() || token.contains(')') {
            return Err(ScriptError::syntax(format!(
                "malformed operator token '{token}'"
            )));
        }
        return Ok(OpToken {
            name: token.to_string(),
            args: Vec::new(),
        });
    };

    let args_str = rest.strip_suffix(')').ok_or_else(|| {
        ScriptError::syntax(format!("unmatched parenthesis in operator token '{token}'"))
    })?;
    if name.is_empty() || args_str.contains('(') || args_str.contains(')') {
        return Err(ScriptError::syntax(format!(
            "malformed operator token '{token}'"
        )));
    }

    let args = if args_str.is_empty() {
        Vec::new()
    } else {
        args_str.split(',').map(str::to_string).collect()
    };
    Ok(OpToken {
        name: name.to_string(),
        args,
    })
}
