use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};

use crate::config::{Backend, Config};
use crate::entity::Note;
use crate::error::{ForgeError, Result};
use crate::identity::{EnvIdentity, IdentityProvider, StaticIdentity};
use crate::storage::{forge_dir, init_store, open_store, FORGE_DIR};
use crate::sync::NoteSynchronizer;

/// Find the project root by looking for .stellarforge/ or .git/
fn find_project_root() -> PathBuf {
    let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

    let mut current = cwd.as_path();
    loop {
        if current.join(FORGE_DIR).exists() || current.join(".git").exists() {
            return current.to_path_buf();
        }
        match current.parent() {
            Some(parent) => current = parent,
            None => return cwd,
        }
    }
}

/// Resolve the data directory and its config, failing if uninitialized
fn open_project() -> Result<(PathBuf, Config)> {
    let dir = forge_dir(&find_project_root());
    if !dir.exists() {
        return Err(ForgeError::NotInitialized);
    }
    let config = Config::load(&dir)?;
    Ok((dir, config))
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?)
}

fn short_id(note: &Note) -> String {
    note.id.to_string()[..7].to_string()
}

fn first_line(content: &str) -> &str {
    content.lines().next().unwrap_or("")
}

pub fn handle_init(backend: Backend, debounce_ms: Option<u64>) -> Result<()> {
    let root = env::current_dir()?;
    let dir = forge_dir(&root);

    if dir.exists() {
        return Err(ForgeError::AlreadyInitialized);
    }

    let mut config = Config {
        backend,
        ..Config::default()
    };
    if let Some(ms) = debounce_ms {
        config.debounce_ms = ms;
    }

    std::fs::create_dir_all(&dir)?;
    let initialized = init_store(&dir, backend).and_then(|_| config.save(&dir));
    if let Err(e) = initialized {
        // No partial project left behind
        let _ = std::fs::remove_dir_all(&dir);
        return Err(e);
    }

    println!(
        "Initialized stellarforge project in {} ({} backend)",
        root.display(),
        backend
    );
    Ok(())
}

pub fn handle_show(world: String, json: bool) -> Result<()> {
    let (dir, config) = open_project()?;
    let store = open_store(&dir, config.backend)?;

    let note = runtime()?.block_on(store.fetch_note_by_parent(&world))?;

    match note {
        Some(note) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&note)?);
            } else {
                println!("Note {} for world '{}'", short_id(&note), note.parent_id);
                println!("Owner: {}", note.owner_id);
                println!("Updated: {}", note.updated_at.format("%Y-%m-%d %H:%M:%S"));
                if !note.content.is_empty() {
                    println!("\n{}", note.content);
                }
            }
        }
        None => {
            if json {
                println!("null");
            } else {
                println!("No note for world '{}'", world);
            }
        }
    }

    Ok(())
}

pub fn handle_edit(world: String, actor: Option<String>, replace: bool, json: bool) -> Result<()> {
    let (dir, config) = open_project()?;
    let store = open_store(&dir, config.backend)?;

    let identity: Arc<dyn IdentityProvider> = match actor.or_else(|| config.actor.clone()) {
        Some(actor) => Arc::new(StaticIdentity::new(actor)),
        None => Arc::new(EnvIdentity),
    };
    if identity.current_actor().is_none() {
        return Err(ForgeError::NoActor);
    }

    let (view, edited) = runtime()?.block_on(async {
        let sync = NoteSynchronizer::new(store, identity, config.sync_config(), Some(world.clone()));
        sync.load().await?;

        if atty::is(atty::Stream::Stdin) {
            eprintln!("Editing note for '{}'. Enter text, Ctrl-D to finish.", world);
        }

        let mut edited = false;
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            edited = true;
            let next = if replace {
                line
            } else {
                let mut buffer = sync.content();
                if !buffer.is_empty() {
                    buffer.push('\n');
                }
                buffer.push_str(&line);
                buffer
            };
            sync.update_content(next);
        }

        sync.flush().await;
        Ok::<_, ForgeError>((sync.view(), edited))
    })?;

    if !edited {
        println!("No changes to note for world '{}'", world);
        return Ok(());
    }

    let note = match view.note {
        Some(note) if note.content == view.content => note,
        _ => {
            return Err(ForgeError::Save(format!(
                "latest edit for world '{}' was not saved",
                world
            )))
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&note)?);
    } else {
        println!(
            "Saved note {} for world '{}' ({} chars)",
            short_id(&note),
            note.parent_id,
            note.content.chars().count()
        );
    }
    Ok(())
}

pub fn handle_list(json: bool) -> Result<()> {
    let (dir, config) = open_project()?;
    let store = open_store(&dir, config.backend)?;

    let notes = runtime()?.block_on(store.list_notes())?;

    if json {
        println!("{}", serde_json::to_string_pretty(&notes)?);
        return Ok(());
    }

    if notes.is_empty() {
        println!("No notes found.");
        return Ok(());
    }

    for note in &notes {
        println!(
            "{}  {}  {}  {}",
            short_id(note),
            note.parent_id,
            note.updated_at.format("%Y-%m-%d %H:%M"),
            first_line(&note.content)
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_line() {
        assert_eq!(first_line("one\ntwo"), "one");
        assert_eq!(first_line(""), "");
    }
}
