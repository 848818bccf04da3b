//! (Optional) text parsing of a node's parameter tree: rendering values as
//! text and parsing INI-style `[section]` / `name = value` lines back into
//! writes, from `levcan_param.c`'s `LC_PrintParam`/`LC_ParseParameterLine`
//! family. Gated behind the `text-parsing` Cargo feature.

use crate::error::FileResult;

use super::model::{ParamType, ParameterAddress, ParameterDirectory, pow10};
use super::serve::ParamServer;

/// Trims leading/trailing ASCII space and tab characters, mirroring the
/// reference implementation's `skipspaces`.
fn skipspaces(s: &str) -> &str {
    s.trim_matches(|c: char| c == ' ' || c == '\t')
}

fn prefix_match(full: &str, prefix: &str) -> bool {
    full.starts_with(prefix)
}

/// `name` is a prefix of `addr`'s own name and `addr` is a directory
/// marker. Intentionally permissive (prefix, not exact) — mirrors the
/// reference's `strncmp`-based comparison.
pub fn is_directory(addr: &ParameterAddress, name: &str) -> bool {
    addr.param_type.contains(ParamType::DIR)
        && prefix_match(addr.name.as_deref().unwrap_or(""), name)
}

/// `name` is a prefix of `addr`'s own name and `addr` is not a directory
/// marker.
pub fn is_parameter(addr: &ParameterAddress, name: &str) -> bool {
    !addr.param_type.contains(ParamType::DIR)
        && prefix_match(addr.name.as_deref().unwrap_or(""), name)
}

/// Renders `addr`'s current value as text.
pub fn print_param(addr: &ParameterAddress) -> String {
    if addr.param_type.contains(ParamType::DIR) {
        return addr
            .name
            .clone()
            .unwrap_or_else(|| "Unknown directory".to_string());
    }
    let value = addr.get_value();
    if addr.param_type.contains(ParamType::BOOL) {
        return if value != 0 { "ON" } else { "OFF" }.to_string();
    }
    if addr.param_type.contains(ParamType::ENUM) {
        if value >= 0 {
            if let Some(line) = addr
                .formatting
                .as_deref()
                .and_then(|fmt| fmt.split('\n').nth(value as usize))
            {
                return line.to_string();
            }
        }
        return value.to_string();
    }
    if addr.decimal > 0 {
        let scaled = value as f32 / pow10(addr.decimal);
        return format!("{:.*}", addr.decimal as usize, scaled);
    }
    value.to_string()
}

/// Parses `s` back into a wire-scale integer for `addr`.
///
/// `SPEC_FULL.md` §9 item 3 (preserved, not fixed): the `enum` branch
/// always returns `0` — no lookup of `s` as a line index into the
/// formatting string is performed, exactly matching
/// `LC_GetParameterValueFromStr`'s empty loop body.
pub fn parameter_value_from_str(addr: &ParameterAddress, s: &str) -> i32 {
    let s = skipspaces(s);
    if addr.param_type.contains(ParamType::BOOL) {
        return if s.eq_ignore_ascii_case("on") { 1 } else { 0 };
    }
    if addr.param_type.contains(ParamType::ENUM) {
        return 0;
    }
    if addr.decimal > 0 {
        return s
            .parse::<f32>()
            .map(|f| (f * pow10(addr.decimal)).round() as i32)
            .unwrap_or(0);
    }
    s.parse::<i32>().unwrap_or(0)
}

/// Walks `dir`'s entries, trace-logging each one's `print_param` rendering.
pub fn parameters_print_all(dir: &ParameterDirectory) {
    for entry in &dir.entries {
        log::trace!("{}", print_param(entry));
    }
}

/// Parses lines of an INI-style file against a [`ParamServer`]'s served
/// directories, tracking which directory is "active" across calls the way
/// an INI parser tracks the current `[section]`.
pub struct TextParser<'a> {
    server: &'a ParamServer,
    active: Option<u8>,
}

impl<'a> TextParser<'a> {
    pub fn new(server: &'a ParamServer) -> Self {
        TextParser {
            server,
            active: None,
        }
    }

    /// Parses one line: either `[section]` (selects the active directory
    /// by its display name) or `name = value` (looks up `name` in the
    /// active directory and issues a local write).
    pub fn parse_line(&mut self, line: &str) -> Result<(), FileResult> {
        let line = skipspaces(line);
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            return Ok(());
        }
        if let Some(inner) = line.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            let section = skipspaces(inner);
            for id in 0u8..=u8::MAX {
                let Some(dir) = self.server.directory(id) else {
                    break;
                };
                if dir
                    .entries
                    .first()
                    .is_some_and(|head| is_directory(head, section))
                {
                    self.active = Some(id);
                    return Ok(());
                }
            }
            return Err(FileResult::InvalidName);
        }

        let eq = line.find('=').ok_or(FileResult::InvalidParameter)?;
        let name = skipspaces(&line[..eq]);
        let value_text = skipspaces(&line[eq + 1..]);
        let dir_id = self.active.ok_or(FileResult::NoPath)?;
        let dir = self.server.directory(dir_id).ok_or(FileResult::NoPath)?;
        let entry = dir
            .entries
            .iter()
            .find(|e| is_parameter(e, name))
            .ok_or(FileResult::NoFile)?;
        let value = parameter_value_from_str(entry, value_text);
        if entry.set_value(value) != 0 {
            return Err(FileResult::InvalidParameter);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::model::{TypedAccessor, ValueType};

    fn leaked_i32() -> TypedAccessor {
        TypedAccessor::from_static_i32(Box::leak(Box::new(0)), ValueType::I32)
    }

    fn sample_server() -> ParamServer {
        let mut server = ParamServer::new();
        let mut dir = ParameterDirectory::new();
        dir.entries.push(ParameterAddress::new(
            leaked_i32(),
            0,
            0,
            0,
            0,
            0,
            ValueType::I32,
            ParamType::DIR,
            Some("Motor".into()),
            None,
        ));
        dir.entries.push(ParameterAddress::new(
            leaked_i32(),
            0,
            10_000,
            1,
            0,
            2,
            ValueType::I32,
            ParamType::VALUE,
            Some("Speed".into()),
            None,
        ));
        server.register_directory(dir);
        server
    }

    #[test]
    fn prints_fixed_point_decimal() {
        let server = sample_server();
        let dir = server.directory(0).unwrap();
        let speed = &dir.entries[1];
        assert_eq!(speed.set_value(1234), 0);
        assert_eq!(print_param(speed), "12.34");
    }

    #[test]
    fn enum_value_from_str_is_always_zero() {
        let addr = ParameterAddress::new(
            leaked_i32(),
            0,
            2,
            1,
            0,
            0,
            ValueType::I32,
            ParamType::ENUM,
            Some("Mode".into()),
            Some("Idle\nRun\nFault".into()),
        );
        assert_eq!(parameter_value_from_str(&addr, "Run"), 0);
        assert_eq!(parameter_value_from_str(&addr, "Fault"), 0);
    }

    #[test]
    fn parses_section_then_assignment() {
        let server = sample_server();
        let mut parser = TextParser::new(&server);
        parser.parse_line("[Motor]").unwrap();
        parser.parse_line("Speed = 12.34").unwrap();
        let dir = server.directory(0).unwrap();
        assert_eq!(dir.entries[1].get_value(), 1234);
    }

    #[test]
    fn assignment_without_active_section_is_rejected() {
        let server = sample_server();
        let mut parser = TextParser::new(&server);
        assert_eq!(
            parser.parse_line("Speed = 1").unwrap_err(),
            FileResult::NoPath
        );
    }
}
