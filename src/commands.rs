//! # 文本命令适配层
//!
//! 交互式二进制逐行读取命令，解析为 `Command` 后分派到 `EditorSession` 的对应动作。
//! 这一层只做解析与结果格式化，不含任何业务规则。

use std::path::PathBuf;

use crate::error::AppError;
use crate::operations::FormInput;
use crate::service::TransformationService;
use crate::session::EditorSession;

pub const HELP: &str = "\
commands:
  upload <path>                              upload a local image file
  create width=<w> height=<h> color=<c>     create a blank image
  list                                       list gallery records
  pick <id>                                  select a gallery record
  delete                                     delete the selected record
  load                                       load the selected record into the workspace
  clear                                      reset the workspace to blank
  save [dir]                                 persist (if modified) and export the workspace image
  apply <kind> [key=value ...]               apply a single-image operation
  multi <kind> ids=<a,b,...> [src_region=x,y,w,h] [dest_position=x,y]
  picker <kind>                              open the multi-image picker
  toggle <id>                                toggle a picker candidate
  confirm [src_region=..] [dest_position=..] apply the picker selection
  cancel                                     close the picker
  show                                       show the workspace
  help                                       show this help
  quit                                       end the session";

/// 解析后的命令
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Upload(PathBuf),
    Create(Vec<String>),
    List,
    Pick(i64),
    Delete,
    Load,
    Clear,
    Save(PathBuf),
    Apply { kind: String, fields: Vec<String> },
    Multi { kind: String, fields: Vec<String> },
    Picker(String),
    Toggle(i64),
    Confirm(Vec<String>),
    Cancel,
    Show,
    Help,
    Quit,
}

impl Command {
    /// 解析一行输入；空行返回 `None`。
    pub fn parse(line: &str) -> Result<Option<Self>, AppError> {
        let mut tokens = line.split_whitespace();
        let Some(verb) = tokens.next() else {
            return Ok(None);
        };
        let rest: Vec<String> = tokens.map(str::to_string).collect();

        let command = match verb.to_lowercase().as_str() {
            "upload" => Self::Upload(PathBuf::from(single_argument(verb, &rest)?)),
            "create" => Self::Create(rest),
            "list" | "ls" => Self::List,
            "pick" => Self::Pick(parse_id(single_argument(verb, &rest)?)?),
            "delete" | "rm" => Self::Delete,
            "load" => Self::Load,
            "clear" => Self::Clear,
            "save" => Self::Save(PathBuf::from(rest.first().map(String::as_str).unwrap_or("."))),
            "apply" => {
                let (kind, fields) = split_kind(verb, rest)?;
                Self::Apply { kind, fields }
            }
            "multi" => {
                let (kind, fields) = split_kind(verb, rest)?;
                Self::Multi { kind, fields }
            }
            "picker" => Self::Picker(single_argument(verb, &rest)?.to_string()),
            "toggle" => Self::Toggle(parse_id(single_argument(verb, &rest)?)?),
            "confirm" => Self::Confirm(rest),
            "cancel" => Self::Cancel,
            "show" => Self::Show,
            "help" | "?" => Self::Help,
            "quit" | "exit" => Self::Quit,
            other => return Err(AppError::invalid(format!("Unknown command: {other}"))),
        };
        Ok(Some(command))
    }
}

fn single_argument<'a>(verb: &str, rest: &'a [String]) -> Result<&'a str, AppError> {
    match rest {
        [only] => Ok(only),
        _ => Err(AppError::invalid(format!("Usage: {verb} <argument>"))),
    }
}

fn split_kind(verb: &str, mut rest: Vec<String>) -> Result<(String, Vec<String>), AppError> {
    if rest.is_empty() {
        return Err(AppError::invalid(format!("Usage: {verb} <kind> [key=value ...]")));
    }
    let kind = rest.remove(0);
    Ok((kind, rest))
}

fn parse_id(raw: &str) -> Result<i64, AppError> {
    raw.trim_start_matches('#')
        .parse()
        .map_err(|_| AppError::invalid(format!("Image id must be an integer: {raw}")))
}

fn form_of(fields: &[String]) -> FormInput {
    FormInput::from_pairs(fields.iter().map(String::as_str))
}

/// 执行一条命令，返回要展示给用户的文本。
pub async fn execute<S: TransformationService>(
    session: &mut EditorSession<S>,
    command: Command,
) -> Result<String, AppError> {
    match command {
        Command::Upload(path) => {
            let id = session.upload(&path).await?;
            Ok(format!("uploaded image #{id}"))
        }
        Command::Create(fields) => {
            let id = session.create_blank(&form_of(&fields)).await?;
            Ok(format!("created image #{id}"))
        }
        Command::List => {
            let items = session.gallery()?;
            if items.is_empty() {
                return Ok("gallery is empty".to_string());
            }
            Ok(items
                .iter()
                .map(|item| {
                    let dims = item
                        .dimensions
                        .map(|d| d.to_string())
                        .unwrap_or_else(|| "?".to_string());
                    let marker = if item.selected { "*" } else { " " };
                    format!("{marker} #{} {dims} {}", item.id, item.handle.url())
                })
                .collect::<Vec<_>>()
                .join("\n"))
        }
        Command::Pick(id) => {
            session.pick(id)?;
            Ok(format!("selected image #{id}"))
        }
        Command::Delete => {
            let id = session.delete_selected()?;
            Ok(format!("deleted image #{id}"))
        }
        Command::Load => {
            session.load_into_workspace()?;
            Ok("workspace loaded".to_string())
        }
        Command::Clear => {
            session.clear_workspace();
            Ok("workspace cleared".to_string())
        }
        Command::Save(dir) => {
            let outcome = session.save_workspace(&dir)?;
            let export = match &outcome.export {
                Ok(path) => format!("exported to {}", path.display()),
                Err(reason) => format!("export failed: {reason}"),
            };
            Ok(match outcome.record_id {
                Some(id) => format!("saved as image #{id}, {export}"),
                None => export,
            })
        }
        Command::Apply { kind, fields } => session.apply_operation(&kind, &form_of(&fields)).await,
        Command::Multi { kind, fields } => {
            let form = form_of(&fields);
            let ids = match form.text("ids") {
                Some(raw) => raw.split(',').map(|id| parse_id(id.trim())).collect::<Result<Vec<_>, _>>()?,
                None => Vec::new(),
            };
            session
                .apply_multi_operation(
                    &kind,
                    &ids,
                    form.text("src_region").map(str::to_string),
                    form.text("dest_position").map(str::to_string),
                )
                .await
        }
        Command::Picker(kind) => {
            let candidates = session.open_picker(&kind)?;
            Ok(candidates
                .iter()
                .map(|item| {
                    let dims = item
                        .dimensions
                        .map(|d| d.to_string())
                        .unwrap_or_else(|| "?".to_string());
                    format!("  #{} {dims} {}", item.id, item.handle.url())
                })
                .collect::<Vec<_>>()
                .join("\n"))
        }
        Command::Toggle(id) => {
            let selected = session.toggle_candidate(id)?;
            let order = session
                .picker()
                .map(|picker| {
                    picker
                        .selected()
                        .iter()
                        .map(|id| format!("#{id}"))
                        .collect::<Vec<_>>()
                        .join(", ")
                })
                .unwrap_or_default();
            let state = if selected { "selected" } else { "deselected" };
            Ok(format!("{state} #{id} (selection: [{order}])"))
        }
        Command::Confirm(fields) => {
            let form = form_of(&fields);
            session
                .confirm_picker(
                    form.text("src_region").map(str::to_string),
                    form.text("dest_position").map(str::to_string),
                )
                .await
        }
        Command::Cancel => {
            session.close_picker();
            Ok("picker closed".to_string())
        }
        Command::Show => {
            let view = session.workspace_view();
            let source = view
                .source_id
                .map(|id| format!("#{id}"))
                .unwrap_or_else(|| "-".to_string());
            let history = if view.history.is_empty() { "(none)".to_string() } else { view.history };
            Ok(format!(
                "status: {:?}\nsource: {}\nimage: {}\nmetadata:\n{}\nhistory:\n{}",
                view.status,
                source,
                if view.image_url.is_some() { "displayed" } else { "-" },
                view.metadata_json,
                history
            ))
        }
        Command::Help => Ok(HELP.to_string()),
        Command::Quit => Ok(String::new()),
    }
}
