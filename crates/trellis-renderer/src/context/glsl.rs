//! Declaration scanner backing the headless context's compile and link.
//!
//! Understands just enough GLSL to list a shader's interface: `#define`,
//! `#ifdef`/`#ifndef`/`#if`/`#else`/`#endif`, `#error`, struct definitions,
//! `uniform` declarations (arrays and structs included) and vertex `in`
//! declarations. Function bodies are skipped.

use std::collections::{HashMap, HashSet};

use super::{ActiveAttribute, ActiveUniform, ShaderStage, UniformType};

/// The externally visible declarations of one compiled shader.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct ShaderInterface {
    pub uniforms: Vec<ActiveUniform>,
    pub attributes: Vec<ActiveAttribute>,
}

#[derive(Debug, Clone)]
struct Member {
    name: String,
    ty: String,
    array: Option<usize>,
}

struct Frame {
    parent_active: bool,
    taken: bool,
    active: bool,
}

/// Compiles `source`, returning its interface or a driver-style info log.
pub(crate) fn analyze(source: &str, stage: ShaderStage) -> Result<ShaderInterface, String> {
    let code = preprocess(&strip_block_comments(source))?;
    parse_declarations(&code, stage)
}

fn strip_block_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut rest = source;
    while let Some(start) = rest.find("/*") {
        out.push_str(&rest[..start]);
        match rest[start + 2..].find("*/") {
            Some(end) => {
                let comment = &rest[start..start + 2 + end + 2];
                // keep line numbers stable
                out.extend(comment.chars().filter(|&c| c == '\n'));
                rest = &rest[start + 2 + end + 2..];
            }
            None => {
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

fn evaluate_condition(expression: &str, defines: &HashSet<String>) -> bool {
    let expression = expression.trim();
    if let Some(inner) = expression.strip_prefix("defined") {
        let name = inner.trim().trim_start_matches('(').trim_end_matches(')').trim();
        return defines.contains(name);
    }
    expression != "0"
}

fn preprocess(source: &str) -> Result<String, String> {
    let mut defines = HashSet::new();
    let mut stack: Vec<Frame> = Vec::new();
    let mut out = String::with_capacity(source.len());
    let mut line_count = 0;

    for (number, raw) in source.lines().enumerate() {
        line_count = number + 1;
        let line = raw.split("//").next().unwrap_or_default();
        let trimmed = line.trim();
        let active = stack.last().is_none_or(|f| f.active);

        let Some(directive) = trimmed.strip_prefix('#') else {
            if active {
                out.push_str(line);
            }
            out.push('\n');
            continue;
        };

        let directive = directive.trim_start();
        let (keyword, argument) = directive
            .split_once(char::is_whitespace)
            .map_or((directive, ""), |(k, a)| (k, a.trim()));

        match keyword {
            "ifdef" | "ifndef" | "if" => {
                let condition = match keyword {
                    "ifdef" => defines.contains(argument),
                    "ifndef" => !defines.contains(argument),
                    _ => evaluate_condition(argument, &defines),
                };
                stack.push(Frame {
                    parent_active: active,
                    taken: condition,
                    active: active && condition,
                });
            }
            "elif" | "else" => {
                let Some(frame) = stack.last_mut() else {
                    return Err(format!("ERROR: 0:{line_count}: '#{keyword}' : #{keyword} without #if"));
                };
                let condition = keyword == "else" || evaluate_condition(argument, &defines);
                frame.active = frame.parent_active && !frame.taken && condition;
                frame.taken |= condition;
            }
            "endif" => {
                if stack.pop().is_none() {
                    return Err(format!("ERROR: 0:{line_count}: '#endif' : #endif without #if"));
                }
            }
            "define" if active => {
                if let Some(name) = argument.split_whitespace().next() {
                    defines.insert(name.to_string());
                }
            }
            "undef" if active => {
                defines.remove(argument);
            }
            "error" if active => {
                return Err(format!("ERROR: 0:{line_count}: '#error' : {argument}"));
            }
            _ => {}
        }
        out.push('\n');
    }

    if !stack.is_empty() {
        return Err(format!("ERROR: 0:{line_count}: '' : missing #endif"));
    }
    Ok(out)
}

/// Splits top-level code into statements, dropping function bodies.
fn split_statements(code: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;

    for c in code.chars() {
        match c {
            '{' => {
                depth += 1;
                current.push(c);
            }
            '}' => {
                depth = depth.saturating_sub(1);
                current.push(c);
                if depth == 0 && !current.trim_start().starts_with("struct") {
                    // function definition
                    current.clear();
                }
            }
            ';' if depth == 0 => {
                statements.push(normalize(&current));
                current.clear();
            }
            _ => current.push(c),
        }
    }
    statements.retain(|s| !s.is_empty());
    statements
}

fn normalize(statement: &str) -> String {
    let joined = statement.split_whitespace().collect::<Vec<_>>().join(" ");
    joined.replace(" [", "[").replace("[ ", "[").replace(" ]", "]")
}

fn parse_name(declarator: &str) -> Result<(String, Option<usize>), String> {
    let declarator = declarator.trim();
    match declarator.split_once('[') {
        Some((name, size)) => {
            let size = size.trim_end_matches(']');
            let length = size
                .parse::<usize>()
                .map_err(|_| format!("ERROR: 0:0: '{size}' : array size must be a constant integer"))?;
            Ok((name.trim().to_string(), Some(length)))
        }
        None => Ok((declarator.to_string(), None)),
    }
}

fn is_qualifier(word: &str) -> bool {
    matches!(word, "highp" | "mediump" | "lowp" | "flat" | "smooth" | "centroid")
}

fn parse_struct(statement: &str) -> Result<(String, Vec<Member>), String> {
    let (head, body) = statement
        .split_once('{')
        .ok_or_else(|| format!("ERROR: 0:0: '{statement}' : syntax error"))?;
    let name = head.trim_start_matches("struct").trim().to_string();
    let body = body.trim_end().trim_end_matches('}');

    let mut members = Vec::new();
    for field in body.split(';').map(str::trim).filter(|f| !f.is_empty()) {
        let mut words = field.split(' ').filter(|w| !is_qualifier(w));
        let ty = words
            .next()
            .ok_or_else(|| format!("ERROR: 0:0: '{field}' : syntax error"))?
            .to_string();
        let rest: String = words.collect::<Vec<_>>().join(" ");
        for declarator in rest.split(',') {
            let (member, array) = parse_name(declarator)?;
            members.push(Member {
                name: member,
                ty: ty.clone(),
                array,
            });
        }
    }
    Ok((name, members))
}

fn expand_uniform(
    path: &str,
    ty: &str,
    array: Option<usize>,
    structs: &HashMap<String, Vec<Member>>,
    out: &mut Vec<ActiveUniform>,
) -> Result<(), String> {
    if let Some(utype) = UniformType::from_glsl(ty) {
        let (name, size) = match array {
            Some(length) => (format!("{path}[0]"), length as i32),
            None => (path.to_string(), 1),
        };
        out.push(ActiveUniform { name, size, utype });
        return Ok(());
    }

    let members = structs
        .get(ty)
        .ok_or_else(|| format!("ERROR: 0:0: '{ty}' : undeclared identifier"))?;
    let prefixes: Vec<String> = match array {
        Some(length) => (0..length).map(|i| format!("{path}[{i}]")).collect(),
        None => vec![path.to_string()],
    };
    for prefix in prefixes {
        for member in members {
            expand_uniform(
                &format!("{prefix}.{}", member.name),
                &member.ty,
                member.array,
                structs,
                out,
            )?;
        }
    }
    Ok(())
}

fn parse_declarations(code: &str, stage: ShaderStage) -> Result<ShaderInterface, String> {
    let mut structs = HashMap::new();
    let mut interface = ShaderInterface::default();

    for statement in split_statements(code) {
        if statement.starts_with("struct ") {
            let (name, members) = parse_struct(&statement)?;
            structs.insert(name, members);
            continue;
        }

        // drop layout(...) qualifiers
        let statement = match statement.find(')') {
            Some(end) if statement.starts_with("layout") => statement[end + 1..].trim().to_string(),
            _ => statement,
        };

        let mut words = statement.split(' ').filter(|w| !is_qualifier(w));
        let storage = words.next().unwrap_or_default();
        if storage != "uniform" && storage != "in" {
            continue;
        }
        let Some(ty) = words.next() else {
            return Err(format!("ERROR: 0:0: '{statement}' : syntax error"));
        };
        let declarators: String = words.collect::<Vec<_>>().join(" ");

        for declarator in declarators.split(',') {
            let (name, array) = parse_name(declarator)?;
            if storage == "uniform" {
                expand_uniform(&name, ty, array, &structs, &mut interface.uniforms)?;
            } else if stage == ShaderStage::Vertex {
                let atype = UniformType::from_glsl(ty)
                    .ok_or_else(|| format!("ERROR: 0:0: '{ty}' : invalid attribute type"))?;
                interface.attributes.push(ActiveAttribute {
                    name,
                    size: array.unwrap_or(1) as i32,
                    atype,
                });
            }
        }
    }
    Ok(interface)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_declarations() {
        let source = "#version 300 es\n\
            uniform mat4 uModelViewMatrix;\n\
            uniform highp vec3 uTint, uOffset;\n\
            in vec3 position;\n\
            in vec3 color; // trailing\n\
            void main() { gl_Position = vec4(position, 1.0); }\n";
        let interface = analyze(source, ShaderStage::Vertex).unwrap();
        let names: Vec<_> = interface.uniforms.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["uModelViewMatrix", "uTint", "uOffset"]);
        assert_eq!(interface.attributes.len(), 2);
        assert_eq!(interface.attributes[1].atype, UniformType::Vec3);
    }

    #[test]
    fn test_conditional_blocks() {
        let source = "#define USE_A\n\
            #ifdef USE_A\nin vec3 a;\n#else\nin vec3 b;\n#endif\n\
            #ifndef USE_A\nin vec3 c;\n#endif\n\
            #if 0\nin vec3 d;\n#endif\n";
        let interface = analyze(source, ShaderStage::Vertex).unwrap();
        let names: Vec<_> = interface.attributes.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["a"]);
    }

    #[test]
    fn test_fragment_inputs_are_not_attributes() {
        let interface = analyze("in vec4 vColor;\nout vec4 fragColor;\n", ShaderStage::Fragment).unwrap();
        assert!(interface.attributes.is_empty());
    }

    #[test]
    fn test_struct_and_arrays() {
        let source = "struct Light {\n  vec3 color;\n  float intensity[2];\n};\n\
            uniform Light lights[2];\n\
            uniform float weights[4];\n";
        let interface = analyze(source, ShaderStage::Fragment).unwrap();
        let names: Vec<_> = interface.uniforms.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "lights[0].color",
                "lights[0].intensity[0]",
                "lights[1].color",
                "lights[1].intensity[0]",
                "weights[0]"
            ]
        );
        assert_eq!(interface.uniforms[4].size, 4);
        assert_eq!(interface.uniforms[1].size, 2);
    }

    #[test]
    fn test_error_directive_reports_line() {
        let log = analyze("void main() {}\n#error broken shader\n", ShaderStage::Vertex).unwrap_err();
        assert!(log.contains("0:2"));
        assert!(log.contains("broken shader"));
    }

    #[test]
    fn test_inactive_error_is_ignored() {
        assert!(analyze("#ifdef NOPE\n#error never\n#endif\n", ShaderStage::Vertex).is_ok());
    }

    #[test]
    fn test_unbalanced_conditionals() {
        assert!(analyze("#ifdef A\n", ShaderStage::Vertex).is_err());
        assert!(analyze("#endif\n", ShaderStage::Vertex).is_err());
    }

    #[test]
    fn test_block_comments() {
        let source = "/* uniform float hidden;\n */\nuniform float shown;\n";
        let interface = analyze(source, ShaderStage::Vertex).unwrap();
        assert_eq!(interface.uniforms.len(), 1);
        assert_eq!(interface.uniforms[0].name, "shown");
    }
}
