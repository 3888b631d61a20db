/// Interactive editing shell
///
/// One command per line; the first word selects the command and the rest of
/// the line is its argument.
use ai_pipeline::{ImageModel, ReferenceImage};
use anyhow::{bail, Context, Result};
use exporters::{export_project, DirectoryExporter};
use project::{FrameId, ProjectId};
use session::{Completion, ProjectSession, SessionState};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};

pub const HELP: &str = "\
Commands:
  projects                   list projects
  new <name>                 create and open a project
  open <number|id>           open a project
  close                      back to the project list (discards the draft)
  delete-project <number|id> delete a project
  frames                     list frames of the open project
  gen <description>          generate a draft frame
  regen <description>        regenerate the draft
  finalize                   commit the draft
  delete-frame <order>       delete a committed frame
  reference <path>           lock the style to a reference image
  style <text> [| character] set a manual style template
  reset-style                clear the style template
  template                   show the current style template
  model <dall-e-2|dall-e-3>  choose the image model
  export <dir>               write the open project's frames to a folder
  help                       show this help
  quit                       leave the shell";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Projects,
    New(String),
    Open(String),
    Close,
    DeleteProject(String),
    Frames,
    Generate(String),
    Regenerate(String),
    Finalize,
    DeleteFrame(u32),
    Reference(PathBuf),
    Style { style: String, character: Option<String> },
    ResetStyle,
    Template,
    Model(ImageModel),
    Export(PathBuf),
    Help,
    Quit,
}

/// Parse one input line. Blank lines yield `None`.
pub fn parse_line(line: &str) -> Result<Option<ShellCommand>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };
    let required = |what: &str| -> Result<String> {
        if rest.is_empty() {
            bail!("`{word}` needs {what}");
        }
        Ok(rest.to_string())
    };
    let command = match word.to_ascii_lowercase().as_str() {
        "projects" | "ls" => ShellCommand::Projects,
        "new" => ShellCommand::New(required("a project name")?),
        "open" => ShellCommand::Open(required("a project number or id")?),
        "close" | "back" => ShellCommand::Close,
        "delete-project" => ShellCommand::DeleteProject(required("a project number or id")?),
        "frames" => ShellCommand::Frames,
        "gen" | "generate" => ShellCommand::Generate(required("a scene description")?),
        "regen" | "regenerate" => ShellCommand::Regenerate(required("a scene description")?),
        "finalize" => ShellCommand::Finalize,
        "delete-frame" => {
            let order = required("a frame number")?;
            let order = order
                .parse()
                .with_context(|| format!("not a frame number: {order}"))?;
            ShellCommand::DeleteFrame(order)
        }
        "reference" => ShellCommand::Reference(PathBuf::from(required("an image path")?)),
        "style" => {
            let text = required("style text")?;
            let (style, character) = match text.split_once('|') {
                Some((style, character)) => {
                    let character = character.trim();
                    (
                        style.trim().to_string(),
                        (!character.is_empty()).then(|| character.to_string()),
                    )
                }
                None => (text, None),
            };
            ShellCommand::Style { style, character }
        }
        "reset-style" => ShellCommand::ResetStyle,
        "template" => ShellCommand::Template,
        "model" => {
            let name = required("a model name")?;
            ShellCommand::Model(name.parse().map_err(anyhow::Error::msg)?)
        }
        "export" => ShellCommand::Export(PathBuf::from(required("a directory")?)),
        "help" | "?" => ShellCommand::Help,
        "quit" | "exit" | "q" => ShellCommand::Quit,
        other => bail!("unknown command `{other}`; type `help`"),
    };
    Ok(Some(command))
}

/// Resolve a project by 1-based list position or by id.
pub fn resolve_project(session: &ProjectSession, needle: &str) -> Option<ProjectId> {
    if let Ok(index) = needle.parse::<usize>() {
        if let Some(project) = index.checked_sub(1).and_then(|i| session.projects().get(i)) {
            return Some(project.id.clone());
        }
    }
    session
        .projects()
        .iter()
        .find(|p| p.id.as_str() == needle)
        .map(|p| p.id.clone())
}

fn frame_by_order(session: &ProjectSession, order: u32) -> Option<FrameId> {
    session
        .active_project()?
        .frames
        .iter()
        .find(|f| f.order == order)
        .map(|f| f.id.clone())
}

pub enum Flow {
    Continue,
    Quit,
}

/// Run one parsed command against the session.
pub async fn execute(session: &mut ProjectSession, command: ShellCommand) -> Result<Flow> {
    match command {
        ShellCommand::Projects => print_projects(session),
        ShellCommand::New(name) => {
            let id = session.create_project(&name)?;
            println!("Created and opened \"{}\" ({id})", name.trim());
        }
        ShellCommand::Open(needle) => {
            let id = resolve_project(session, &needle)
                .with_context(|| format!("no project matches `{needle}`"))?;
            session.select_project(&id)?;
            if let Some(project) = session.active_project() {
                println!("Opened \"{}\" with {} frame(s)", project.name, project.frames.len());
            }
        }
        ShellCommand::Close => {
            session.close_project();
            println!("Back to projects");
        }
        ShellCommand::DeleteProject(needle) => {
            let id = resolve_project(session, &needle)
                .with_context(|| format!("no project matches `{needle}`"))?;
            let removed = session.delete_project(&id)?;
            println!("Deleted \"{}\"", removed.name);
        }
        ShellCommand::Frames => print_frames(session)?,
        ShellCommand::Generate(description) => {
            if !session.is_ai_enabled() {
                println!("Demo mode: using a placeholder image...");
            }
            let completion = session.generate(&description).await?;
            report_completion(session, completion);
        }
        ShellCommand::Regenerate(description) => {
            let completion = session.regenerate(&description).await?;
            report_completion(session, completion);
        }
        ShellCommand::Finalize => {
            let frame = session.finalize_frame()?;
            println!("Frame {} added", frame.order);
            report_notice(session);
        }
        ShellCommand::DeleteFrame(order) => {
            let id = frame_by_order(session, order)
                .with_context(|| format!("no frame {order} in the open project"))?;
            session.delete_frame(&id)?;
            println!("Frame {order} deleted");
            report_notice(session);
        }
        ShellCommand::Reference(path) => {
            let image = ReferenceImage::from_path(&path)
                .with_context(|| format!("reading reference image {}", path.display()))?;
            session.set_reference_image(image)?;
            println!("Style locked to {}", path.display());
        }
        ShellCommand::Style { style, character } => {
            let template = session.set_manual_style(&style, character.as_deref())?;
            println!("Style template: {}", template.text);
        }
        ShellCommand::ResetStyle => {
            session.reset_style();
            println!("Style template cleared");
        }
        ShellCommand::Template => match session.style_template() {
            Some(template) => {
                println!("[{}] {}", template.source, template.text);
                if let Some(hint) = &template.character_hint {
                    println!("Character: {hint}");
                }
            }
            None => println!("No style template"),
        },
        ShellCommand::Model(model) => {
            session.set_model(model);
            println!("Model: {model}");
        }
        ShellCommand::Export(dir) => {
            let project = session
                .active_project()
                .context("open a project first")?
                .clone();
            let report = export_project(&DirectoryExporter::new(&dir), &project).await;
            println!(
                "Exported {} frame(s) to {}",
                report.uploaded.len(),
                dir.display()
            );
            if !report.failed.is_empty() {
                println!("Failed: {}", report.failed.join(", "));
            }
        }
        ShellCommand::Help => println!("{HELP}"),
        ShellCommand::Quit => return Ok(Flow::Quit),
    }
    Ok(Flow::Continue)
}

fn report_completion(session: &ProjectSession, completion: Completion) {
    match completion {
        Completion::Ready(frame) => {
            println!("Draft frame {}: {}", frame.order, frame.image_url);
            report_notice(session);
            println!("`finalize` to keep it, `regen <description>` to try again");
        }
        Completion::Stale => println!("Generation result discarded"),
    }
}

fn report_notice(session: &ProjectSession) {
    if let Some(notice) = session.notice() {
        println!("Note: {notice}");
    }
}

fn print_projects(session: &ProjectSession) {
    if session.projects().is_empty() {
        println!("No projects yet; `new <name>` creates one");
        return;
    }
    for (i, project) in session.projects().iter().enumerate() {
        let marker = if session.active_project_id() == Some(&project.id) { '*' } else { ' ' };
        println!(
            "{marker}{:>3}. {} ({} frame(s), modified {})",
            i + 1,
            project.name,
            project.frames.len(),
            project.last_modified.format("%Y-%m-%d %H:%M")
        );
    }
}

fn print_frames(session: &ProjectSession) -> Result<()> {
    let project = session.active_project().context("open a project first")?;
    for frame in &project.frames {
        println!("{:>3}. {}  {}", frame.order, frame.description, frame.image_url);
    }
    if let Some(draft) = session.draft() {
        println!("  (draft {}) {}  {}", draft.order, draft.description, draft.image_url);
    }
    if project.frames.is_empty() && session.draft().is_none() {
        println!("No frames yet; `gen <description>` makes one");
    }
    Ok(())
}

fn prompt(session: &ProjectSession) -> String {
    match (session.active_project(), session.state()) {
        (Some(project), SessionState::DraftReady) => format!("{} (draft)> ", project.name),
        (Some(project), _) => format!("{}> ", project.name),
        (None, _) => "mangastrip> ".to_string(),
    }
}

/// Read commands from stdin until `quit` or end of input.
pub async fn run(session: &mut ProjectSession) -> Result<()> {
    use std::io::Write as _;

    println!("{HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{}", prompt(session));
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let command = match parse_line(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(err) => {
                println!("{err}");
                continue;
            }
        };
        match execute(session, command).await {
            Ok(Flow::Quit) => break,
            Ok(Flow::Continue) => {}
            Err(err) => println!("Error: {err:#}"),
        }
    }
    Ok(())
}
