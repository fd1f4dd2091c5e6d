//! The context assembler (C10, spec §4.10): expands `REF[...]` references
//! embedded in prompts and rule files into the runtime system prompt.
//!
//! Grounded on `astrid-runtime::rules::assemble_context`'s two-pass
//! expand-then-splice shape; the bracket-depth scanner replaces the
//! teacher's regex-based matcher because a dynamic tool call's JSON
//! arguments may themselves contain `[`/`]` (e.g. an array argument), which
//! a regex without a counter cannot balance.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use wbench_approval::ApprovalGate;
use wbench_core::{AgentId, AllowedPaths, DocumentLocation, HostEditor};
use wbench_tools::{ToolContext, ToolRegistry};

/// Recursion cap for static includes (spec §5 "include-expansion depth 20").
const MAX_INCLUDE_DEPTH: u32 = 20;

/// The result of assembling one prompt: the fully-spliced text plus any
/// front-matter parameters collected from included Markdown (spec §4.10
/// "propagate them to the caller").
#[derive(Debug, Clone, Default)]
pub struct AssembledContext {
    /// The prompt with every resolvable `REF[...]` expanded in place.
    pub content: String,
    /// Front-matter key/value pairs collected from included Markdown.
    pub front_matter: BTreeMap<String, String>,
}

/// Expands static includes and dynamic tool references in prompt text.
#[derive(Clone)]
pub struct ContextAssembler {
    host: Arc<dyn HostEditor>,
    tool_registry: Arc<ToolRegistry>,
    approval_gate: ApprovalGate,
}

impl ContextAssembler {
    /// Build an assembler over the given host, tool registry, and approval
    /// gate (dynamic `REF[]` tool calls run inside its rule-parsing scope).
    #[must_use]
    pub fn new(host: Arc<dyn HostEditor>, tool_registry: Arc<ToolRegistry>, approval_gate: ApprovalGate) -> Self {
        Self { host, tool_registry, approval_gate }
    }

    /// Expand every `REF[...]` in `text` against `allowed_paths`.
    pub async fn assemble(&self, text: &str, allowed_paths: &AllowedPaths) -> AssembledContext {
        let mut front_matter = BTreeMap::new();
        let content = self.expand(text, allowed_paths, 0, &mut front_matter).await;
        AssembledContext { content, front_matter }
    }

    fn expand<'a>(
        &'a self,
        text: &'a str,
        allowed_paths: &'a AllowedPaths,
        depth: u32,
        front_matter: &'a mut BTreeMap<String, String>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = String> + Send + 'a>> {
        Box::pin(async move {
            if depth > MAX_INCLUDE_DEPTH {
                return text.to_string();
            }

            let bytes = text.as_bytes();
            let mut output = String::with_capacity(text.len());
            let mut cursor = 0;

            while let Some(rel_start) = text[cursor..].find("REF[") {
                let marker_start = cursor + rel_start;
                let inner_start = marker_start + "REF[".len();
                output.push_str(&text[cursor..marker_start]);

                match find_matching_bracket(bytes, inner_start) {
                    Some(inner_end) => {
                        let inner = &text[inner_start..inner_end];
                        let expanded = self.expand_one(inner, allowed_paths, depth, front_matter).await;
                        output.push_str(&expanded);
                        cursor = inner_end + 1;
                    }
                    None => {
                        // Malformed bracket: left intact (spec §4.10).
                        output.push_str(&text[marker_start..]);
                        cursor = text.len();
                        break;
                    }
                }
            }
            output.push_str(&text[cursor..]);
            output
        })
    }

    async fn expand_one(&self, inner: &str, allowed_paths: &AllowedPaths, depth: u32, front_matter: &mut BTreeMap<String, String>) -> String {
        if let Some(brace_idx) = inner.find('{') {
            let tool_name = inner[..brace_idx].trim().to_string();
            let json_str = &inner[brace_idx..];
            return match serde_json::from_str::<Value>(json_str) {
                Ok(args) => self.invoke_tool(&tool_name, args, allowed_paths).await,
                Err(err) => format!("> Error parsing arguments for '{tool_name}': {err}"),
            };
        }

        let (path, start_line, end_line) = parse_static_ref(inner);
        match self.read_static_include(&path, start_line, end_line, allowed_paths).await {
            Ok(mut included) => {
                if is_text_like(&path) {
                    included = extract_front_matter(&included, front_matter);
                    included = self.expand(&included, allowed_paths, depth + 1, front_matter).await;
                }
                included
            }
            Err(message) => format!("> Error: {message}"),
        }
    }

    async fn invoke_tool(&self, name: &str, args: Value, allowed_paths: &AllowedPaths) -> String {
        let _scope = self.approval_gate.enter_rule_parsing_scope();
        let ctx = ToolContext::new(AgentId::new(), false, allowed_paths.clone(), Arc::clone(&self.host), self.approval_gate.clone(), CancellationToken::new());
        match self.tool_registry.dispatch(name, args, &ctx).await {
            Ok(result) => result,
            Err(err) => format!("> Error: {err}"),
        }
    }

    async fn read_static_include(&self, path: &str, start_line: Option<usize>, end_line: Option<usize>, allowed_paths: &AllowedPaths) -> Result<String, String> {
        if !allowed_paths.allows(path) {
            return Err(format!("'{path}' is outside the allowed paths"));
        }

        let location = DocumentLocation::bare(path);
        if path.ends_with('/') {
            let entries = self.host.read_directory(&location).await.map_err(|err| err.to_string())?;
            let mut names: Vec<String> = entries.into_iter().map(|entry| if entry.is_dir { format!("{}/", entry.name) } else { entry.name }).collect();
            names.sort();
            return Ok(names.join("\n"));
        }

        let bytes = self.host.read_file(&location).await.map_err(|err| err.to_string())?;
        let text = String::from_utf8_lossy(&bytes).into_owned();
        if start_line.is_none() && end_line.is_none() {
            return Ok(text);
        }

        let lines: Vec<&str> = text.lines().collect();
        let start_idx = start_line.unwrap_or(1).max(1) - 1;
        let end_idx = end_line.unwrap_or(lines.len()).min(lines.len());
        if start_idx >= end_idx {
            return Ok(String::new());
        }
        Ok(lines[start_idx..end_idx].join("\n"))
    }
}

/// Find the index of the `]` that balances the `[` implied by the `REF[`
/// this scan started at, treating quoted JSON string content as opaque so
/// brackets inside a dynamic call's string arguments don't unbalance the
/// count.
fn find_matching_bracket(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth: i32 = 1;
    let mut in_string = false;
    let mut escape = false;
    let mut i = start;
    while i < bytes.len() {
        let b = bytes[i];
        if in_string {
            if escape {
                escape = false;
            } else if b == b'\\' {
                escape = true;
            } else if b == b'"' {
                in_string = false;
            }
        } else {
            match b {
                b'"' => in_string = true,
                b'[' => depth += 1,
                b']' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                _ => {}
            }
        }
        i += 1;
    }
    None
}

/// Split `inner` into `(path, startLine, endLine)`, reading numeric line
/// markers right-to-left so a path itself containing `:` (e.g. a
/// `root/sub:path`) is tolerated.
fn parse_static_ref(inner: &str) -> (String, Option<usize>, Option<usize>) {
    let segments: Vec<&str> = inner.split(':').collect();
    let is_numeric = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());

    if segments.len() >= 3 && is_numeric(segments[segments.len() - 1]) && is_numeric(segments[segments.len() - 2]) {
        let end = segments[segments.len() - 1].parse().ok();
        let start = segments[segments.len() - 2].parse().ok();
        return (segments[..segments.len() - 2].join(":"), start, end);
    }
    if segments.len() >= 2 && is_numeric(segments[segments.len() - 1]) {
        let line = segments[segments.len() - 1].parse().ok();
        return (segments[..segments.len() - 1].join(":"), line, line);
    }
    (inner.to_string(), None, None)
}

fn is_text_like(path: &str) -> bool {
    path.ends_with(".md") || path.ends_with(".txt")
}

/// Strip a leading `---\n...\n---` front-matter block, merging its
/// `key: value` lines into `front_matter`, and return the remaining body.
fn extract_front_matter(text: &str, front_matter: &mut BTreeMap<String, String>) -> String {
    let Some(rest) = text.strip_prefix("---\n") else { return text.to_string() };
    let Some(end) = rest.find("\n---") else { return text.to_string() };

    for line in rest[..end].lines() {
        if let Some((key, value)) = line.split_once(':') {
            front_matter.insert(key.trim().to_string(), value.trim().to_string());
        }
    }

    rest[end + "\n---".len()..].trim_start_matches('\n').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use wbench_core::{CoreError, DirEntry};

    struct MapHost {
        files: Mutex<HashMap<String, Vec<u8>>>,
    }

    impl MapHost {
        fn new(files: &[(&str, &str)]) -> Self {
            Self { files: Mutex::new(files.iter().map(|(k, v)| (k.to_string(), v.as_bytes().to_vec())).collect()) }
        }
    }

    #[async_trait::async_trait]
    impl HostEditor for MapHost {
        async fn open_document(&self, _: &DocumentLocation) -> Result<(), CoreError> {
            Ok(())
        }
        async fn show_document(&self, _: &DocumentLocation, _: bool) -> Result<(), CoreError> {
            Ok(())
        }
        async fn write_file(&self, _: &DocumentLocation, _: &[u8]) -> Result<(), CoreError> {
            Ok(())
        }
        async fn read_file(&self, loc: &DocumentLocation) -> Result<Vec<u8>, CoreError> {
            self.files.lock().unwrap().get(&loc.to_string()).cloned().ok_or_else(|| CoreError::NotFound(loc.to_string()))
        }
        async fn delete_file(&self, _: &DocumentLocation) -> Result<(), CoreError> {
            Ok(())
        }
        async fn rename_file(&self, _: &DocumentLocation, _: &DocumentLocation) -> Result<(), CoreError> {
            Ok(())
        }
        async fn create_directory(&self, _: &DocumentLocation) -> Result<(), CoreError> {
            Ok(())
        }
        async fn read_directory(&self, _: &DocumentLocation) -> Result<Vec<DirEntry>, CoreError> {
            Ok(vec![DirEntry { name: "a.txt".to_string(), is_dir: false }, DirEntry { name: "sub".to_string(), is_dir: true }])
        }
        async fn watch_deletions(&self, _: &DocumentLocation) -> Result<(), CoreError> {
            Ok(())
        }
        async fn show_notification(&self, _: &str) {}
        async fn clipboard_write(&self, _: &str) -> Result<(), CoreError> {
            Ok(())
        }
        async fn register_command(&self, _: &str) -> Result<(), CoreError> {
            Ok(())
        }
        async fn create_file_system_watcher(&self, _: &std::path::Path) -> Result<(), CoreError> {
            Ok(())
        }
    }

    fn assembler(files: &[(&str, &str)]) -> ContextAssembler {
        ContextAssembler::new(Arc::new(MapHost::new(files)), Arc::new(ToolRegistry::with_defaults()), ApprovalGate::new())
    }

    #[tokio::test]
    async fn splices_a_whole_file() {
        let assembler = assembler(&[("notes.txt", "hello world")]);
        let result = assembler.assemble("see REF[notes.txt] now", &AllowedPaths::compile(&["/".to_string()])).await;
        assert_eq!(result.content, "see hello world now");
    }

    #[tokio::test]
    async fn splices_a_single_line_range() {
        let assembler = assembler(&[("notes.txt", "one\ntwo\nthree")]);
        let result = assembler.assemble("REF[notes.txt:2]", &AllowedPaths::compile(&["/".to_string()])).await;
        assert_eq!(result.content, "two");
    }

    #[tokio::test]
    async fn splices_a_start_end_line_range() {
        let assembler = assembler(&[("notes.txt", "one\ntwo\nthree\nfour")]);
        let result = assembler.assemble("REF[notes.txt:2:3]", &AllowedPaths::compile(&["/".to_string()])).await;
        assert_eq!(result.content, "two\nthree");
    }

    #[tokio::test]
    async fn collects_front_matter_from_included_markdown() {
        let assembler = assembler(&[("doc.md", "---\ntitle: Hello\n---\nbody text")]);
        let result = assembler.assemble("REF[doc.md]", &AllowedPaths::compile(&["/".to_string()])).await;
        assert_eq!(result.content, "body text");
        assert_eq!(result.front_matter.get("title"), Some(&"Hello".to_string()));
    }

    #[tokio::test]
    async fn malformed_brackets_are_left_intact() {
        let assembler = assembler(&[]);
        let result = assembler.assemble("broken REF[unterminated", &AllowedPaths::compile(&["/".to_string()])).await;
        assert_eq!(result.content, "broken REF[unterminated");
    }

    #[tokio::test]
    async fn out_of_bounds_path_becomes_an_inline_error() {
        let assembler = assembler(&[("secret.txt", "shh")]);
        let result = assembler.assemble("REF[secret.txt]", &AllowedPaths::compile(&["/allowed".to_string()])).await;
        assert!(result.content.starts_with("> Error:"));
    }

    #[tokio::test]
    async fn dynamic_tool_reference_invokes_the_registry() {
        let assembler = assembler(&[("notes.txt", "file body")]);
        let result = assembler
            .assemble(r#"REF[read_file{"uri": "notes.txt"}]"#, &AllowedPaths::compile(&["/".to_string()]))
            .await;
        assert_eq!(result.content, "file body");
    }

    #[tokio::test]
    async fn directory_listing_is_splicable() {
        let assembler = assembler(&[]);
        let result = assembler.assemble("REF[root/]", &AllowedPaths::compile(&["/".to_string()])).await;
        assert_eq!(result.content, "a.txt\nsub/");
    }
}
