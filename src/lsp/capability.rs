// SPDX-License-Identifier: MIT
//! Typed capability request/response schemas and their translation to the
//! underlying LSP JSON-RPC methods.
use crate::locate::{LocateTarget, Scope};
use crate::lsp::process::LspProcess;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileLocation {
    pub file: String,
    pub line: u32,
    pub character: u32,
}

fn to_uri(file: &Path) -> String {
    format!("file://{}", file.display())
}

fn from_uri(uri: &str) -> String {
    uri.strip_prefix("file://").unwrap_or(uri).to_string()
}

fn open_text_document(proc: &mut LspProcess, file: &Path, language_id: &str) -> Result<String> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    proc.notify(
        "textDocument/didOpen",
        serde_json::json!({
            "textDocument": {
                "uri": to_uri(file),
                "languageId": language_id,
                "version": 1,
                "text": content,
            }
        }),
    )?;
    Ok(content)
}

fn parse_locations(result: &serde_json::Value) -> Vec<FileLocation> {
    let items: Vec<&serde_json::Value> = if let Some(arr) = result.as_array() {
        arr.iter().collect()
    } else if result.is_object() {
        vec![result]
    } else {
        return Vec::new();
    };

    items
        .into_iter()
        .filter_map(|item| {
            let uri = item.get("uri").and_then(|u| u.as_str())?;
            let start = item.get("range")?.get("start")?;
            let line = start.get("line")?.as_u64()? as u32;
            let character = start.get("character")?.as_u64()? as u32;
            Some(FileLocation {
                file: from_uri(uri),
                line,
                character,
            })
        })
        .collect()
}

// ─── definition ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefinitionRequest {
    pub file: String,
    pub line: u32,
    pub character: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefinitionResponse {
    pub locations: Vec<FileLocation>,
}

pub fn definition(
    proc: &mut LspProcess,
    language_id: &str,
    req: &DefinitionRequest,
) -> Result<Option<DefinitionResponse>> {
    let file = Path::new(&req.file);
    open_text_document(proc, file, language_id)?;
    let result = proc.request(
        "textDocument/definition",
        serde_json::json!({
            "textDocument": { "uri": to_uri(file) },
            "position": { "line": req.line, "character": req.character },
        }),
    )?;
    if result.is_null() {
        return Ok(None);
    }
    let locations = parse_locations(&result);
    if locations.is_empty() {
        return Ok(None);
    }
    Ok(Some(DefinitionResponse { locations }))
}

// ─── hover ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoverRequest {
    pub file: String,
    pub line: u32,
    pub character: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoverResponse {
    pub contents: String,
}

pub fn hover(
    proc: &mut LspProcess,
    language_id: &str,
    req: &HoverRequest,
) -> Result<Option<HoverResponse>> {
    let file = Path::new(&req.file);
    open_text_document(proc, file, language_id)?;
    let result = proc.request(
        "textDocument/hover",
        serde_json::json!({
            "textDocument": { "uri": to_uri(file) },
            "position": { "line": req.line, "character": req.character },
        }),
    )?;
    if result.is_null() {
        return Ok(None);
    }
    let contents = match result.get("contents") {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Object(o)) => o
            .get("value")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        Some(serde_json::Value::Array(arr)) => arr
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string).or_else(|| {
                v.get("value").and_then(|x| x.as_str()).map(str::to_string)
            }))
            .collect::<Vec<_>>()
            .join("\n"),
        _ => return Ok(None),
    };
    Ok(Some(HoverResponse { contents }))
}

// ─── reference ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceRequest {
    pub file: String,
    pub line: u32,
    pub character: u32,
    #[serde(default)]
    pub include_declaration: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceResponse {
    pub locations: Vec<FileLocation>,
}

pub fn reference(
    proc: &mut LspProcess,
    language_id: &str,
    req: &ReferenceRequest,
) -> Result<Option<ReferenceResponse>> {
    let file = Path::new(&req.file);
    open_text_document(proc, file, language_id)?;
    let result = proc.request(
        "textDocument/references",
        serde_json::json!({
            "textDocument": { "uri": to_uri(file) },
            "position": { "line": req.line, "character": req.character },
            "context": { "includeDeclaration": req.include_declaration },
        }),
    )?;
    if result.is_null() {
        return Ok(None);
    }
    let locations = parse_locations(&result);
    if locations.is_empty() {
        return Ok(None);
    }
    Ok(Some(ReferenceResponse { locations }))
}

// ─── outline ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutlineRequest {
    pub file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolNode {
    pub name: String,
    pub kind: String,
    pub line: u32,
    pub character: u32,
    #[serde(default)]
    pub children: Vec<SymbolNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutlineResponse {
    pub symbols: Vec<SymbolNode>,
}

fn symbol_kind_name(kind: u64) -> &'static str {
    match kind {
        1 => "file",
        2 => "module",
        3 => "namespace",
        4 => "package",
        5 => "class",
        6 => "method",
        7 => "property",
        8 => "field",
        9 => "constructor",
        10 => "enum",
        11 => "interface",
        12 => "function",
        13 => "variable",
        14 => "constant",
        15 => "string",
        16 => "number",
        17 => "boolean",
        18 => "array",
        19 => "object",
        20 => "key",
        21 => "null",
        22 => "enum_member",
        23 => "struct",
        24 => "event",
        25 => "operator",
        26 => "type_parameter",
        _ => "other",
    }
}

fn parse_document_symbols(result: &serde_json::Value) -> Vec<SymbolNode> {
    let arr = match result.as_array() {
        Some(a) => a,
        None => return Vec::new(),
    };
    arr.iter()
        .filter_map(|item| {
            let name = item.get("name")?.as_str()?.to_string();
            let kind = item.get("kind").and_then(|k| k.as_u64()).unwrap_or(0);
            // DocumentSymbol has `selectionRange`; SymbolInformation has `location.range`.
            let range = item
                .get("selectionRange")
                .or_else(|| item.get("location").and_then(|l| l.get("range")))
                .or_else(|| item.get("range"))?;
            let start = range.get("start")?;
            let line = start.get("line")?.as_u64()? as u32;
            let character = start.get("character")?.as_u64()? as u32;
            let children = item
                .get("children")
                .map(parse_document_symbols)
                .unwrap_or_default();
            Some(SymbolNode {
                name,
                kind: symbol_kind_name(kind).to_string(),
                line,
                character,
                children,
            })
        })
        .collect()
}

pub fn outline(
    proc: &mut LspProcess,
    language_id: &str,
    req: &OutlineRequest,
) -> Result<Option<OutlineResponse>> {
    let file = Path::new(&req.file);
    open_text_document(proc, file, language_id)?;
    let result = proc.request(
        "textDocument/documentSymbol",
        serde_json::json!({ "textDocument": { "uri": to_uri(file) } }),
    )?;
    if result.is_null() {
        return Ok(None);
    }
    let symbols = parse_document_symbols(&result);
    if symbols.is_empty() {
        return Ok(None);
    }
    Ok(Some(OutlineResponse { symbols }))
}

// ─── symbol (closest enclosing symbol at a position) ──────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolRequest {
    pub file: String,
    pub line: u32,
    pub character: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolResponse {
    pub symbol: SymbolNode,
}

fn find_enclosing(nodes: &[SymbolNode], line: u32) -> Option<&SymbolNode> {
    let mut best: Option<&SymbolNode> = None;
    for node in nodes {
        if node.line <= line {
            if let Some(child_best) = find_enclosing(&node.children, line) {
                best = Some(child_best);
            } else {
                best = Some(node);
            }
        }
    }
    best
}

pub fn symbol(
    proc: &mut LspProcess,
    language_id: &str,
    req: &SymbolRequest,
) -> Result<Option<SymbolResponse>> {
    let outline_resp = outline(
        proc,
        language_id,
        &OutlineRequest {
            file: req.file.clone(),
        },
    )?;
    let Some(outline_resp) = outline_resp else {
        return Ok(None);
    };
    find_enclosing(&outline_resp.symbols, req.line)
        .cloned()
        .map(|symbol| Ok(Some(SymbolResponse { symbol })))
        .unwrap_or(Ok(None))
}

// ─── search (workspace symbol) ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub kinds: Vec<String>,
    #[serde(default)]
    pub max_items: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceSymbolHit {
    pub name: String,
    pub kind: String,
    pub location: FileLocation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub hits: Vec<WorkspaceSymbolHit>,
}

pub fn search(proc: &mut LspProcess, req: &SearchRequest) -> Result<Option<SearchResponse>> {
    let result = proc.request(
        "workspace/symbol",
        serde_json::json!({ "query": req.query }),
    )?;
    if result.is_null() {
        return Ok(None);
    }
    let arr = match result.as_array() {
        Some(a) => a,
        None => return Ok(None),
    };
    let mut hits: Vec<WorkspaceSymbolHit> = arr
        .iter()
        .filter_map(|item| {
            let name = item.get("name")?.as_str()?.to_string();
            let kind = item.get("kind").and_then(|k| k.as_u64()).unwrap_or(0);
            let kind = symbol_kind_name(kind).to_string();
            let loc = item.get("location")?;
            let uri = loc.get("uri")?.as_str()?;
            let start = loc.get("range")?.get("start")?;
            let line = start.get("line")?.as_u64()? as u32;
            let character = start.get("character")?.as_u64()? as u32;
            Some(WorkspaceSymbolHit {
                name,
                kind,
                location: FileLocation {
                    file: from_uri(uri),
                    line,
                    character,
                },
            })
        })
        .collect();
    if !req.kinds.is_empty() {
        hits.retain(|h| req.kinds.contains(&h.kind));
    }
    if let Some(max) = req.max_items {
        hits.truncate(max);
    }
    if hits.is_empty() {
        return Ok(None);
    }
    Ok(Some(SearchResponse { hits }))
}

// ─── rename ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenameRequest {
    pub file: String,
    pub line: u32,
    pub character: u32,
    pub new_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEdit {
    pub file: String,
    pub edits: Vec<TextEdit>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextEdit {
    pub start_line: u32,
    pub start_character: u32,
    pub end_line: u32,
    pub end_character: u32,
    pub new_text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenamePreviewResponse {
    pub file_edits: Vec<FileEdit>,
}

fn parse_workspace_edit(result: &serde_json::Value) -> Vec<FileEdit> {
    let changes = match result.get("changes").and_then(|c| c.as_object()) {
        Some(c) => c,
        None => return Vec::new(),
    };
    changes
        .iter()
        .filter_map(|(uri, edits)| {
            let edits: Vec<TextEdit> = edits
                .as_array()?
                .iter()
                .filter_map(|e| {
                    let range = e.get("range")?;
                    let start = range.get("start")?;
                    let end = range.get("end")?;
                    Some(TextEdit {
                        start_line: start.get("line")?.as_u64()? as u32,
                        start_character: start.get("character")?.as_u64()? as u32,
                        end_line: end.get("line")?.as_u64()? as u32,
                        end_character: end.get("character")?.as_u64()? as u32,
                        new_text: e.get("newText")?.as_str()?.to_string(),
                    })
                })
                .collect();
            Some(FileEdit {
                file: from_uri(uri),
                edits,
            })
        })
        .collect()
}

fn request_rename_edit(
    proc: &mut LspProcess,
    language_id: &str,
    req: &RenameRequest,
) -> Result<Vec<FileEdit>> {
    let file = Path::new(&req.file);
    open_text_document(proc, file, language_id)?;
    let result = proc.request(
        "textDocument/rename",
        serde_json::json!({
            "textDocument": { "uri": to_uri(file) },
            "position": { "line": req.line, "character": req.character },
            "newName": req.new_name,
        }),
    )?;
    Ok(parse_workspace_edit(&result))
}

pub fn rename_preview(
    proc: &mut LspProcess,
    language_id: &str,
    req: &RenameRequest,
) -> Result<Option<RenamePreviewResponse>> {
    let file_edits = request_rename_edit(proc, language_id, req)?;
    if file_edits.is_empty() {
        return Ok(None);
    }
    Ok(Some(RenamePreviewResponse { file_edits }))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenameExecuteResponse {
    pub files_changed: Vec<String>,
}

/// Apply a previously-computed rename edit set to disk, line-oriented and
/// applied back-to-front per file so earlier edits don't shift later offsets.
pub fn rename_execute(
    proc: &mut LspProcess,
    language_id: &str,
    req: &RenameRequest,
) -> Result<Option<RenameExecuteResponse>> {
    let file_edits = request_rename_edit(proc, language_id, req)?;
    if file_edits.is_empty() {
        return Ok(None);
    }
    let mut files_changed = Vec::new();
    for file_edit in &file_edits {
        apply_edits_to_file(&file_edit.file, &file_edit.edits)?;
        files_changed.push(file_edit.file.clone());
    }
    Ok(Some(RenameExecuteResponse { files_changed }))
}

fn apply_edits_to_file(path: &str, edits: &[TextEdit]) -> Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {path} for rename"))?;
    let mut lines: Vec<String> = content.split('\n').map(str::to_string).collect();

    let mut sorted: Vec<&TextEdit> = edits.iter().collect();
    sorted.sort_by(|a, b| {
        b.start_line
            .cmp(&a.start_line)
            .then(b.start_character.cmp(&a.start_character))
    });

    for edit in sorted {
        let line_idx = edit.start_line as usize;
        if line_idx >= lines.len() {
            continue;
        }
        if edit.start_line == edit.end_line {
            let line = &lines[line_idx];
            let start = edit.start_character as usize;
            let end = edit.end_character as usize;
            if start > line.len() || end > line.len() || start > end {
                continue;
            }
            let mut new_line = String::with_capacity(line.len());
            new_line.push_str(&line[..start]);
            new_line.push_str(&edit.new_text);
            new_line.push_str(&line[end..]);
            lines[line_idx] = new_line;
        } else {
            let end_idx = edit.end_line as usize;
            if end_idx >= lines.len() {
                continue;
            }
            let prefix = lines[line_idx][..edit.start_character as usize].to_string();
            let suffix = lines[end_idx][edit.end_character as usize..].to_string();
            let replacement = format!("{prefix}{}{suffix}", edit.new_text);
            lines.splice(line_idx..=end_idx, [replacement]);
        }
    }

    std::fs::write(path, lines.join("\n"))
        .with_context(|| format!("failed to write {path} after rename"))?;
    Ok(())
}

// ─── locate ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocateRequest {
    pub locate: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocateResponse {
    pub file: String,
    pub line: u32,
    pub character: u32,
}

/// Resolve a locate-string to a concrete file position by reading the
/// target file directly — this capability never touches the LSP server.
pub fn locate(req: &LocateRequest) -> Result<Option<LocateResponse>> {
    let target = LocateTarget::parse(&req.locate)
        .with_context(|| format!("failed to parse locate string `{}`", req.locate))?;
    let content = std::fs::read_to_string(&target.file)
        .with_context(|| format!("failed to read {}", target.file.display()))?;
    let lines: Vec<&str> = content.split('\n').collect();

    let (line_range_start, line_range_end) = match &target.scope {
        Some(Scope::Line(n)) => (*n, *n),
        Some(Scope::LineRange(a, b)) => (*a, *b),
        Some(Scope::SymbolPath(_)) | None => (0, lines.len().saturating_sub(1) as u32),
    };

    if let Some(find) = &target.find {
        let (needle, marker_offset) = find.split_marker();
        for line_no in line_range_start..=line_range_end.min(lines.len().saturating_sub(1) as u32) {
            if let Some(line) = lines.get(line_no as usize) {
                if let Some(idx) = line.find(&needle) {
                    let character = (idx + marker_offset) as u32;
                    return Ok(Some(LocateResponse {
                        file: target.file.to_string_lossy().to_string(),
                        line: line_no,
                        character,
                    }));
                }
            }
        }
        return Ok(None);
    }

    Ok(Some(LocateResponse {
        file: target.file.to_string_lossy().to_string(),
        line: line_range_start,
        character: 0,
    }))
}
