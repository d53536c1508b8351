//! Script plugins - `.rhai` entry files run in an embedded Rhai engine
//!
//! Each plugin gets its own engine and AST, so script functions and
//! globals of one plugin are never visible to another. The script body
//! runs once when loaded. The registration hook is a script function:
//!
//! ```rhai
//! fn setup(bot, config_dir) {
//!     bot.command("ping", "Pong from a plugin!");
//!     bot.command("roll", |ctx| "rolled " + ctx.args[0], "Roll a die");
//! }
//! ```
//!
//! Closure handlers receive `ctx`, a map with `author`, `channel`, `args`
//! and `config_dir`; whatever they return is sent back as the reply. The
//! optional third argument is the description shown by `help`.
//!
//! Every call into a script (top level, `setup`, each handler) is capped at
//! [`MAX_OPERATIONS`], so a runaway handler fails instead of hanging.

use rhai::{CallFnOptions, Dynamic, Engine, EvalAltResult, FnPtr, Map, Scope, AST};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::module::{PluginHost, PluginModule};
use crate::application::errors::{CommandError, PluginError, PluginResult};
use crate::domain::entities::{Command, Message};

pub const SCRIPT_EXTENSION: &str = "rhai";
const SETUP_FN: &str = "setup";

/// Operations allowed per call into a script
pub const MAX_OPERATIONS: u64 = 500_000;

// Same limits in debug and release builds
const MAX_EXPR_DEPTH: usize = 128;
const MAX_FUNCTION_EXPR_DEPTH: usize = 64;

/// A compiled script entry
pub struct ScriptModule {
    engine: Arc<Engine>,
    ast: Arc<AST>,
    has_setup: bool,
}

impl ScriptModule {
    /// Compile the entry file and run its top-level statements
    pub fn load(plugin: &str, path: &Path) -> PluginResult<Self> {
        let load_error = |e: Box<EvalAltResult>| PluginError::Load {
            path: path.to_path_buf(),
            message: e.to_string(),
        };

        let engine = build_engine(plugin);

        let ast = engine
            .compile_file(PathBuf::from(path))
            .map_err(load_error)?;
        engine
            .run_ast_with_scope(&mut Scope::new(), &ast)
            .map_err(load_error)?;

        let has_setup = ast
            .iter_functions()
            .any(|f| f.name == SETUP_FN && f.params.len() == 2);

        Ok(Self {
            engine: Arc::new(engine),
            ast: Arc::new(ast),
            has_setup,
        })
    }

    fn command(&self, staged: StagedCommand, config_dir: &str) -> Command {
        let command = match staged.reply {
            ScriptReply::Text(text) => Command::new(staged.name).with_reply(text),
            ScriptReply::Handler(handler) => {
                let engine = Arc::clone(&self.engine);
                let ast = Arc::clone(&self.ast);
                let config_dir = config_dir.to_string();
                Command::new(staged.name).with_handler(move |msg| {
                    handler
                        .call::<Dynamic>(&engine, &ast, (context_map(msg, &config_dir),))
                        .map(|reply| if reply.is_unit() { String::new() } else { reply.to_string() })
                        .map_err(|e| CommandError::ExecutionFailed(e.to_string()))
                })
            }
        };

        match staged.description {
            Some(description) => command.with_description(description),
            None => command,
        }
    }
}

fn build_engine(plugin: &str) -> Engine {
    let mut engine = Engine::new();
    ScriptBot::register(&mut engine);

    engine.set_max_expr_depths(MAX_EXPR_DEPTH, MAX_FUNCTION_EXPR_DEPTH);
    engine.on_progress(|count| {
        if count > MAX_OPERATIONS {
            Some(format!("Safety limit exceeded: maximum {} operations", MAX_OPERATIONS).into())
        } else {
            None
        }
    });

    let print_name = plugin.to_string();
    engine.on_print(move |text| tracing::info!("[{}] {}", print_name, text));
    let debug_name = plugin.to_string();
    engine.on_debug(move |text, _source, pos| {
        tracing::debug!("[{}] {} {}", debug_name, pos, text)
    });

    engine
}

impl PluginModule for ScriptModule {
    fn kind(&self) -> &'static str {
        "script"
    }

    fn has_setup(&self) -> bool {
        self.has_setup
    }

    fn setup(&self, host: &mut PluginHost<'_>, config_dir: &Path) -> PluginResult<()> {
        let setup_error = |message: String| PluginError::Setup {
            plugin: host.plugin_name().to_string(),
            message,
        };

        let bot = ScriptBot::new(host.prefix());
        let config_dir = config_dir.to_string_lossy().into_owned();

        // Top-level statements already ran in `load`
        let options = CallFnOptions::new().eval_ast(false);
        self.engine
            .call_fn_with_options::<Dynamic>(
                options,
                &mut Scope::new(),
                &self.ast,
                SETUP_FN,
                (bot.clone(), config_dir.clone()),
            )
            .map(drop)
            .map_err(|e| setup_error(e.to_string()))?;

        let staged = bot.take().map_err(setup_error)?;
        for command in staged {
            let command = self.command(command, &config_dir);
            host.add_command(command);
        }
        Ok(())
    }
}

fn context_map(msg: &Message, config_dir: &str) -> Dynamic {
    let args = msg.args().iter().cloned().map(Dynamic::from).collect();

    let mut ctx = Map::new();
    ctx.insert("author".into(), Dynamic::from(msg.author_name()));
    ctx.insert("channel".into(), Dynamic::from(msg.chat_id.clone()));
    ctx.insert("args".into(), Dynamic::from_array(args));
    ctx.insert("config_dir".into(), Dynamic::from(config_dir.to_string()));
    Dynamic::from_map(ctx)
}

#[derive(Debug, Clone)]
enum ScriptReply {
    Text(String),
    Handler(FnPtr),
}

#[derive(Debug, Clone)]
struct StagedCommand {
    name: String,
    reply: ScriptReply,
    description: Option<String>,
}

/// The `bot` value scripts see in `setup`
#[derive(Debug, Clone)]
struct ScriptBot {
    prefix: String,
    staged: Arc<Mutex<Vec<StagedCommand>>>,
}

impl ScriptBot {
    fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            staged: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn register(engine: &mut Engine) {
        engine
            .register_type_with_name::<ScriptBot>("Bot")
            .register_fn("command", |bot: &mut ScriptBot, name: &str, reply: &str| {
                bot.stage(name, ScriptReply::Text(reply.to_string()), None)
            })
            .register_fn("command", |bot: &mut ScriptBot, name: &str, handler: FnPtr| {
                bot.stage(name, ScriptReply::Handler(handler), None)
            })
            .register_fn(
                "command",
                |bot: &mut ScriptBot, name: &str, reply: &str, description: &str| {
                    bot.stage(name, ScriptReply::Text(reply.to_string()), Some(description))
                },
            )
            .register_fn(
                "command",
                |bot: &mut ScriptBot, name: &str, handler: FnPtr, description: &str| {
                    bot.stage(name, ScriptReply::Handler(handler), Some(description))
                },
            )
            .register_fn("prefix", |bot: &mut ScriptBot| bot.prefix.clone());
    }

    fn stage(
        &mut self,
        name: &str,
        reply: ScriptReply,
        description: Option<&str>,
    ) -> Result<(), Box<EvalAltResult>> {
        let name = name.trim();
        if name.is_empty() || name.contains(char::is_whitespace) {
            return Err(format!("invalid command name `{}`", name).into());
        }
        self.staged
            .lock()
            .map_err(|_| "command list poisoned")?
            .push(StagedCommand {
                name: name.to_string(),
                reply,
                description: description.map(str::to_string),
            });
        Ok(())
    }

    fn take(&self) -> Result<Vec<StagedCommand>, String> {
        self.staged
            .lock()
            .map(|mut staged| std::mem::take(&mut *staged))
            .map_err(|_| "command list poisoned".to_string())
    }
}
