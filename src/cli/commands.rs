use super::{Cli, Command, ServerAction};
use crate::broker::{self, CreateRequest, CreateResponse, DeleteRequest, DeleteResponse};
use crate::config::AppConfig;
use crate::ipc::UdsClient;
use crate::locate::LocateTarget;
use crate::lsp::capability::*;
use crate::session::SessionInfo;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

fn load_config(cli: &Cli) -> AppConfig {
    AppConfig::new(None, None, None, None, if cli.debug { Some("debug".into()) } else { None })
}

async fn ensure_session(config: &AppConfig, path: &Path) -> Result<CreateResponse> {
    let broker = broker::connect(config).await?;
    broker
        .post::<_, CreateResponse>("/create", &CreateRequest { path: path.to_path_buf() })
        .await?
        .context("broker returned no body for /create")
}

async fn session_client(config: &AppConfig, path: &Path) -> Result<(UdsClient, CreateResponse)> {
    let created = ensure_session(config, path).await?;
    let client = UdsClient::new(created.uds_path.clone());
    Ok((client, created))
}

fn print_info_line(info: &SessionInfo, markdown: bool) {
    if markdown {
        println!(
            "| {} | {} | {:.0}s | {} |",
            info.id,
            info.language,
            info.remaining_time_secs,
            info.project_root.display()
        );
    } else {
        println!(
            "{:<28} {:<10} {:>8.0}s remaining  {}",
            info.id,
            info.language,
            info.remaining_time_secs,
            info.project_root.display()
        );
    }
}

pub async fn dispatch(cli: Cli) -> Result<()> {
    let config = load_config(&cli);
    let markdown = cli.markdown;

    match &cli.command {
        Command::Server { action } => server_action(&config, action, markdown).await,
        Command::Locate { locate, check } => cmd_locate(&config, locate, *check).await,
        Command::Definition { locate, decl, type_ } => {
            cmd_definition(&config, locate, *decl, *type_).await
        }
        Command::Hover { locate } => cmd_hover(&config, locate).await,
        Command::Reference {
            locate,
            impl_,
            ref_,
            max_items,
            ..
        } => cmd_reference(&config, locate, *impl_, *ref_, *max_items).await,
        Command::Outline { file, all } => cmd_outline(&config, file, *all, markdown).await,
        Command::Symbol { locate } => cmd_symbol(&config, locate).await,
        Command::Search {
            query,
            workspace,
            kinds,
            max_items,
            ..
        } => cmd_search(&config, query, workspace.as_deref(), kinds, *max_items).await,
        Command::Rename {
            new_name,
            locate,
            execute,
            ..
        } => cmd_rename(&config, new_name, locate, *execute).await,
    }
}

async fn server_action(config: &AppConfig, action: &ServerAction, markdown: bool) -> Result<()> {
    match action {
        ServerAction::List => {
            let broker = broker::connect(config).await?;
            let infos: Vec<SessionInfo> = broker.get("/list").await?.unwrap_or_default();
            if infos.is_empty() {
                println!("No active sessions.");
            } else {
                if markdown {
                    println!("| id | language | idle | project root |");
                    println!("|---|---|---|---|");
                }
                for info in &infos {
                    print_info_line(info, markdown);
                }
            }
            Ok(())
        }
        ServerAction::Start { path } => {
            let created = ensure_session(config, path).await?;
            println!("started session: {}", created.uds_path.display());
            print_info_line(&created.info, markdown);
            Ok(())
        }
        ServerAction::Stop { path } => {
            let broker = broker::connect(config).await?;
            let resp: Option<DeleteResponse> = broker
                .delete("/delete", &DeleteRequest { path: path.clone() })
                .await?;
            match resp.and_then(|r| r.info) {
                Some(info) => {
                    println!("stopped session:");
                    print_info_line(&info, markdown);
                }
                None => println!("no active session for {}", path.display()),
            }
            Ok(())
        }
        ServerAction::StopBroker => {
            let broker = broker::connect(config).await?;
            let _: Option<()> = broker.post("/shutdown", &serde_json::json!({})).await?;
            println!("broker shutdown requested");
            Ok(())
        }
        ServerAction::RunBroker => {
            broker::run(std::sync::Arc::new(config.clone())).await
        }
    }
}

fn locate_file(locate: &str) -> Result<PathBuf> {
    Ok(LocateTarget::parse(locate)
        .with_context(|| format!("failed to parse locate string `{locate}`"))?
        .file)
}

async fn resolve_position(client: &UdsClient, locate: &str) -> Result<LocateResponse> {
    client
        .post::<_, LocateResponse>("/locate", &LocateRequest { locate: locate.to_string() })
        .await?
        .with_context(|| format!("could not resolve `{locate}` to a position"))
}

async fn cmd_locate(config: &AppConfig, locate: &str, check: bool) -> Result<()> {
    let file = locate_file(locate)?;
    let (client, _) = session_client(config, &file).await?;
    let resolved = resolve_position(&client, locate).await?;
    if check {
        println!("ok: {}:{}:{}", resolved.file, resolved.line, resolved.character);
    } else {
        println!("{}:{}:{}", resolved.file, resolved.line, resolved.character);
    }
    Ok(())
}

async fn cmd_definition(config: &AppConfig, locate: &str, _decl: bool, _type_: bool) -> Result<()> {
    let file = locate_file(locate)?;
    let (client, _) = session_client(config, &file).await?;
    let pos = resolve_position(&client, locate).await?;
    let req = DefinitionRequest {
        file: pos.file,
        line: pos.line,
        character: pos.character,
    };
    match client.post::<_, DefinitionResponse>("/definition", &req).await? {
        Some(resp) => {
            for loc in resp.locations {
                println!("{}:{}:{}", loc.file, loc.line, loc.character);
            }
        }
        None => println!("Warning: No definition found"),
    }
    Ok(())
}

async fn cmd_hover(config: &AppConfig, locate: &str) -> Result<()> {
    let file = locate_file(locate)?;
    let (client, _) = session_client(config, &file).await?;
    let pos = resolve_position(&client, locate).await?;
    let req = HoverRequest {
        file: pos.file,
        line: pos.line,
        character: pos.character,
    };
    match client.post::<_, HoverResponse>("/hover", &req).await? {
        Some(resp) => println!("{}", resp.contents),
        None => println!("Warning: No hover information found"),
    }
    Ok(())
}

async fn cmd_reference(
    config: &AppConfig,
    locate: &str,
    _impl_: bool,
    _ref_: bool,
    max_items: Option<usize>,
) -> Result<()> {
    let file = locate_file(locate)?;
    let (client, _) = session_client(config, &file).await?;
    let pos = resolve_position(&client, locate).await?;
    let req = ReferenceRequest {
        file: pos.file,
        line: pos.line,
        character: pos.character,
        include_declaration: false,
    };
    match client.post::<_, ReferenceResponse>("/reference", &req).await? {
        Some(mut resp) => {
            if let Some(max) = max_items {
                resp.locations.truncate(max);
            }
            for loc in resp.locations {
                println!("{}:{}:{}", loc.file, loc.line, loc.character);
            }
        }
        None => println!("Warning: No references found"),
    }
    Ok(())
}

async fn cmd_outline(config: &AppConfig, file: &Path, _all: bool, markdown: bool) -> Result<()> {
    let (client, _) = session_client(config, file).await?;
    let req = OutlineRequest {
        file: file.to_string_lossy().to_string(),
    };
    match client.post::<_, OutlineResponse>("/outline", &req).await? {
        Some(resp) => print_outline(&resp.symbols, 0, markdown),
        None => println!("Warning: No outline available"),
    }
    Ok(())
}

fn print_outline(symbols: &[SymbolNode], depth: usize, markdown: bool) {
    for s in symbols {
        if markdown {
            println!("{}- **{}** `{}` ({}:{})", "  ".repeat(depth), s.name, s.kind, s.line, s.character);
        } else {
            println!("{}{} {} ({}:{})", "  ".repeat(depth), s.kind, s.name, s.line, s.character);
        }
        print_outline(&s.children, depth + 1, markdown);
    }
}

async fn cmd_symbol(config: &AppConfig, locate: &str) -> Result<()> {
    let file = locate_file(locate)?;
    let (client, _) = session_client(config, &file).await?;
    let pos = resolve_position(&client, locate).await?;
    let req = SymbolRequest {
        file: pos.file,
        line: pos.line,
        character: pos.character,
    };
    match client.post::<_, SymbolResponse>("/symbol", &req).await? {
        Some(resp) => println!("{} {} ({}:{})", resp.symbol.kind, resp.symbol.name, resp.symbol.line, resp.symbol.character),
        None => println!("Warning: No symbol information found"),
    }
    Ok(())
}

async fn cmd_search(
    config: &AppConfig,
    query: &str,
    workspace: Option<&Path>,
    kinds: &[String],
    max_items: Option<usize>,
) -> Result<()> {
    let anchor = workspace
        .map(Path::to_path_buf)
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
    let (client, _) = session_client(config, &anchor).await?;
    let req = SearchRequest {
        query: query.to_string(),
        kinds: kinds.to_vec(),
        max_items,
    };
    match client.post::<_, SearchResponse>("/search", &req).await? {
        Some(resp) => {
            for hit in resp.hits {
                println!(
                    "{} {} {}:{}:{}",
                    hit.kind, hit.name, hit.location.file, hit.location.line, hit.location.character
                );
            }
        }
        None => println!("Warning: No matching symbols found"),
    }
    Ok(())
}

async fn cmd_rename(config: &AppConfig, new_name: &str, locate: &str, execute: bool) -> Result<()> {
    let file = locate_file(locate)?;
    let (client, _) = session_client(config, &file).await?;
    let pos = resolve_position(&client, locate).await?;
    let req = RenameRequest {
        file: pos.file,
        line: pos.line,
        character: pos.character,
        new_name: new_name.to_string(),
    };
    if execute {
        match client.post::<_, RenameExecuteResponse>("/rename/execute", &req).await? {
            Some(resp) => {
                println!("renamed in {} file(s):", resp.files_changed.len());
                for f in resp.files_changed {
                    println!("  {f}");
                }
            }
            None => println!("Warning: Nothing to rename"),
        }
    } else {
        match client.post::<_, RenamePreviewResponse>("/rename/preview", &req).await? {
            Some(resp) => {
                for file_edit in resp.file_edits {
                    println!("{}: {} edit(s)", file_edit.file, file_edit.edits.len());
                }
            }
            None => println!("Warning: Nothing to rename"),
        }
    }
    Ok(())
}
