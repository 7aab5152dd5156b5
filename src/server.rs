//! MCP server exposing the search session as tools.

use crate::config::Config;
use crate::loader::FsLoader;
use crate::routing::ShardRouter;
use crate::session::{ChannelPresenter, ResultSet, SearchSession, SessionOptions};
use crate::store::ShardStore;
use crate::tools::preload::{PreloadRequest, handle_preload};
use crate::tools::search::{SearchRequest, handle_search};
use crate::tools::status::handle_shard_status;
use rmcp::{
    ServerHandler,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::*,
    schemars::{self, JsonSchema, generate::SchemaSettings},
    tool, tool_handler, tool_router,
};
use std::sync::Arc;
use tokio::sync::{Mutex, watch};

/// MCP Server for symbol searches over documentation shards
#[derive(Clone)]
pub struct SymbolServer {
    /// The live session shared by all tool calls
    session: Arc<SearchSession>,

    /// Latest presented results
    results: watch::Receiver<Option<ResultSet>>,

    /// Serializes searches so each caller sees its own revision settle
    search_lock: Arc<Mutex<()>>,

    /// Tool router for handling MCP tool calls
    tool_router: ToolRouter<Self>,
}

impl std::fmt::Debug for SymbolServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymbolServer")
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

#[tool_router]
impl SymbolServer {
    /// Create a server searching shards from `store` routed by `router`.
    pub fn new(store: ShardStore, router: ShardRouter, options: SessionOptions) -> Self {
        let (presenter, results) = ChannelPresenter::new();
        let session = SearchSession::new(store, router, Arc::new(presenter), options);
        Self {
            session: Arc::new(session),
            results,
            search_lock: Arc::new(Mutex::new(())),
            tool_router: Self::tool_router(),
        }
    }

    /// Create a server reading shards from the configured directory.
    pub fn from_config(config: &Config) -> Self {
        let root = config.shards.resolved_root();
        tracing::info!("Serving shards from {}", root.display());

        let store = ShardStore::with_failure_grace(
            Arc::new(FsLoader::new(root)),
            config.store.failure_grace(),
        );
        let router = ShardRouter::from_config(&config.categories);
        let options = SessionOptions {
            max_results: config.session.max_results,
            debounce: config.session.debounce(),
            categories: config.session.categories.clone(),
        };
        Self::new(store, router, options)
    }

    pub fn session(&self) -> &Arc<SearchSession> {
        &self.session
    }

    #[tool(
        description = "Search documented symbols (functions, classes, variables, ...) by name. The query must begin with the name's first character: shards are split by leading character, so 'ixed' will not find 'Fixed'. Matches are case-insensitive and ranked exact, then prefix, then substring. Each result lists every place the symbol is defined with a link to its documentation.",
        input_schema = inline_schema_for_type::<SearchRequest>()
    )]
    async fn search_symbols(
        &self,
        Parameters(request): Parameters<SearchRequest>,
    ) -> std::result::Result<String, String> {
        let _guard = self.search_lock.lock().await;
        let mut results = self.results.clone();
        handle_search(&self.session, &mut results, request).await
    }

    #[tool(
        description = "Load every shard of the given categories into memory so later searches answer without waiting on disk.",
        input_schema = inline_schema_for_type::<PreloadRequest>()
    )]
    async fn preload_shards(
        &self,
        Parameters(request): Parameters<PreloadRequest>,
    ) -> std::result::Result<String, String> {
        handle_preload(&self.session, request).await
    }

    #[tool(description = "Show which shards are loaded, store counters, and the current session state.")]
    async fn shard_status(&self) -> std::result::Result<String, String> {
        Ok(handle_shard_status(&self.session).await)
    }
}

#[tool_handler]
impl ServerHandler for SymbolServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo::new(ServerCapabilities::builder().enable_tools().build())
            .with_protocol_version(ProtocolVersion::V_2024_11_05)
            .with_server_info(Implementation::from_build_env())
            .with_instructions(
                "symbol-search: Incremental symbol search over generated API documentation. \
                 Use search_symbols with the start of a symbol name. \
                 Shards load lazily; preload_shards warms the cache up front.",
            )
    }
}

/// Generate an inline JSON schema for MCP tools
///
/// Sets `inline_subschemas = true` so nested types are expanded in place
/// instead of emitted as `$ref` definitions.
pub fn inline_schema_for_type<T: JsonSchema>() -> Arc<JsonObject> {
    let mut settings = SchemaSettings::draft07();
    settings.transforms = vec![Box::new(schemars::transform::AddNullable::default())];
    settings.inline_subschemas = true;

    let generator = settings.into_generator();
    let schema = generator.into_root_schema_for::<T>();
    let json_object = match serde_json::to_value(schema) {
        Ok(serde_json::Value::Object(object)) => object,
        Ok(_) | Err(_) => {
            tracing::error!("Schema for tool input did not serialize to an object");
            JsonObject::new()
        }
    };

    Arc::new(json_object)
}
