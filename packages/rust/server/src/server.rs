//! Request loop, dispatch and the collection cache.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use favs_core::{AdapterRegistry, SilentProgress, read_all};
use favs_shared::{
    AppConfig, CancellationToken, Collection, FavsError, FilteredCollection, RenderOptions, Result,
};

use crate::protocol::{JsonRpcRequest, JsonRpcResponse, PROTOCOL_VERSION, ProtocolError};

const URI_SCHEME: &str = "favs://";
const URI_ALL: &str = "favs://all";
const URI_MARKDOWN: &str = "favs://markdown";

const MIME_JSON: &str = "application/json";
const MIME_MARKDOWN: &str = "text/markdown";

const TOOL_SYNC: &str = "sync_bookmarks";
const TOOL_SEARCH: &str = "search_bookmarks";

#[derive(Debug, Deserialize)]
struct ReadParams {
    uri: String,
}

#[derive(Debug, Deserialize)]
struct CallParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Debug, Deserialize)]
struct SearchArgs {
    query: String,
}

#[derive(Debug, Serialize)]
struct SearchHit<'a> {
    title: &'a str,
    url: &'a str,
}

/// Protocol server over a shared registry.
///
/// Holds one cached all-sources collection. The cache fills on first use and
/// is only cleared by the resync tool.
pub struct Server {
    registry: Arc<AdapterRegistry>,
    config: AppConfig,
    cache: RwLock<Option<Arc<Collection>>>,
}

impl Server {
    pub fn new(registry: Arc<AdapterRegistry>, config: AppConfig) -> Self {
        Self {
            registry,
            config,
            cache: RwLock::new(None),
        }
    }

    /// Serve on the process's stdin and stdout.
    pub async fn serve_stdio(&self, cancel: &CancellationToken) -> Result<()> {
        let reader = BufReader::new(tokio::io::stdin());
        self.serve(reader, tokio::io::stdout(), cancel).await
    }

    /// Handle one request per line until end of input or cancellation.
    ///
    /// Malformed frames are logged and skipped. Requests are handled one at a
    /// time and each response is flushed before the next line is read.
    #[instrument(skip_all)]
    pub async fn serve<R, W>(&self, mut reader: R, mut writer: W, cancel: &CancellationToken) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        info!("protocol server ready");
        let mut frame = Vec::new();

        loop {
            frame.clear();
            let read = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("cancelled, stopping protocol server");
                    break;
                }
                read = reader.read_until(b'\n', &mut frame) => {
                    read.map_err(|e| FavsError::io("<stdin>", e))?
                }
            };
            if read == 0 {
                debug!("end of input");
                break;
            }

            let line = frame.trim_ascii();
            if line.is_empty() {
                continue;
            }

            // Bad UTF-8 is a decode error like any other malformed frame.
            let request: JsonRpcRequest = match serde_json::from_slice(line) {
                Ok(request) => request,
                Err(e) => {
                    warn!(error = %e, "skipping malformed frame");
                    continue;
                }
            };
            if request.jsonrpc != "2.0" {
                warn!(version = %request.jsonrpc, "skipping frame with unsupported jsonrpc version");
                continue;
            }

            if let Some(response) = self.handle(request, cancel).await {
                write_response(&mut writer, &response).await?;
            }
        }

        Ok(())
    }

    /// Dispatch one request. Notifications produce no response.
    #[instrument(skip_all, fields(method = %request.method))]
    async fn handle(
        &self,
        request: JsonRpcRequest,
        cancel: &CancellationToken,
    ) -> Option<JsonRpcResponse> {
        let Some(id) = request.id else {
            if !request.method.starts_with("notifications/") {
                if let Err(e) = self.dispatch(&request.method, request.params, cancel).await {
                    debug!(error = %e, "notification failed");
                }
            }
            return None;
        };

        let response = match self.dispatch(&request.method, request.params, cancel).await {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(e) => {
                debug!(error = %e, "request failed");
                JsonRpcResponse::error(id, &e)
            }
        };
        Some(response)
    }

    async fn dispatch(
        &self,
        method: &str,
        params: Value,
        cancel: &CancellationToken,
    ) -> std::result::Result<Value, ProtocolError> {
        match method {
            "initialize" => Ok(initialize()),
            "ping" => Ok(json!({})),
            "resources/list" => Ok(self.resources_list()),
            "resources/read" => self.resources_read(params, cancel).await,
            "tools/list" => Ok(tools_list()),
            "tools/call" => self.tools_call(params, cancel).await,
            other => Err(ProtocolError::MethodNotFound(other.to_string())),
        }
    }

    // -----------------------------------------------------------------------
    // Cache
    // -----------------------------------------------------------------------

    /// The cached collection, reading every source on first use.
    async fn collection(&self, cancel: &CancellationToken) -> Arc<Collection> {
        if let Some(cached) = self.cache.read().await.as_ref() {
            return Arc::clone(cached);
        }

        let mut slot = self.cache.write().await;
        if let Some(cached) = slot.as_ref() {
            return Arc::clone(cached);
        }

        let collection = Arc::new(read_all(&self.registry, &self.config, cancel, &SilentProgress).await);
        info!(
            bookmarks = collection.len(),
            sources = collection.sources().len(),
            "bookmark cache populated"
        );
        *slot = Some(Arc::clone(&collection));
        collection
    }

    async fn invalidate(&self) {
        *self.cache.write().await = None;
        debug!("bookmark cache cleared");
    }

    // -----------------------------------------------------------------------
    // Resources
    // -----------------------------------------------------------------------

    fn resources_list(&self) -> Value {
        let mut resources = vec![
            json!({
                "uri": URI_ALL,
                "name": "All Bookmarks",
                "description": "All browser bookmarks in JSON format",
                "mimeType": MIME_JSON,
            }),
            json!({
                "uri": URI_MARKDOWN,
                "name": "Bookmarks (Markdown)",
                "description": "All browser bookmarks in Markdown format",
                "mimeType": MIME_MARKDOWN,
            }),
        ];

        for source in self.registry.available_sources() {
            resources.push(json!({
                "uri": format!("{URI_SCHEME}{}", source.name()),
                "name": format!("{} Bookmarks", source.display_name()),
                "description": format!("Bookmarks from {}", source.display_name()),
                "mimeType": MIME_JSON,
            }));
        }

        json!({ "resources": resources })
    }

    async fn resources_read(
        &self,
        params: Value,
        cancel: &CancellationToken,
    ) -> std::result::Result<Value, ProtocolError> {
        let ReadParams { uri } = serde_json::from_value(params)
            .map_err(|e| ProtocolError::invalid_params(e.to_string()))?;

        let (renderer, mime, source) = match uri.as_str() {
            URI_ALL => ("json", MIME_JSON, None),
            URI_MARKDOWN => ("markdown", MIME_MARKDOWN, None),
            other => match other.strip_prefix(URI_SCHEME) {
                Some(name) if self.registry.source(name).is_some() => ("json", MIME_JSON, Some(name)),
                _ => return Err(ProtocolError::invalid_params(format!("unknown resource: {uri}"))),
            },
        };

        let collection = self.collection(cancel).await;
        let view = match source {
            Some(name) => FilteredCollection::from(collection.only_source(name)),
            None => FilteredCollection::from(&*collection),
        };
        let text = self.render(renderer, &view)?;

        Ok(json!({
            "contents": [{ "uri": uri, "mimeType": mime, "text": text }]
        }))
    }

    fn render(&self, name: &str, view: &FilteredCollection) -> std::result::Result<String, ProtocolError> {
        let renderer = self
            .registry
            .renderer(name)
            .ok_or_else(|| FavsError::renderer_not_found(name))?;
        renderer.configure((&self.config.renderer(name)).into())?;
        let bytes = renderer.render(view, &RenderOptions::default())?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    // -----------------------------------------------------------------------
    // Tools
    // -----------------------------------------------------------------------

    async fn tools_call(
        &self,
        params: Value,
        cancel: &CancellationToken,
    ) -> std::result::Result<Value, ProtocolError> {
        let CallParams { name, arguments } = serde_json::from_value(params)
            .map_err(|e| ProtocolError::invalid_params(e.to_string()))?;

        let text = match name.as_str() {
            TOOL_SYNC => {
                self.invalidate().await;
                let collection = self.collection(cancel).await;
                format!(
                    "Synced {} bookmarks from {} sources",
                    collection.len(),
                    collection.sources().len()
                )
            }
            TOOL_SEARCH => {
                let SearchArgs { query } = serde_json::from_value(arguments)
                    .map_err(|e| ProtocolError::invalid_params(format!("invalid search arguments: {e}")))?;
                let collection = self.collection(cancel).await;
                search(&collection, &query)?
            }
            other => return Err(ProtocolError::invalid_params(format!("unknown tool: {other}"))),
        };

        Ok(json!({ "content": [{ "type": "text", "text": text }] }))
    }
}

fn search(collection: &Collection, query: &str) -> std::result::Result<String, ProtocolError> {
    let needle = query.to_lowercase();
    let hits: Vec<SearchHit<'_>> = collection
        .bookmarks()
        .iter()
        .filter(|b| b.title.to_lowercase().contains(&needle) || b.url.to_lowercase().contains(&needle))
        .map(|b| SearchHit {
            title: &b.title,
            url: &b.url,
        })
        .collect();

    let listing =
        serde_json::to_string_pretty(&hits).map_err(|e| ProtocolError::Internal(e.to_string()))?;
    Ok(format!("Found {} matches:\n{listing}", hits.len()))
}

fn initialize() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "serverInfo": {
            "name": "favs",
            "version": env!("CARGO_PKG_VERSION"),
        },
        "capabilities": {
            "resources": { "subscribe": false, "listChanged": false },
            "tools": {},
        },
    })
}

fn tools_list() -> Value {
    json!({
        "tools": [
            {
                "name": TOOL_SYNC,
                "description": "Refresh bookmarks from all available browsers",
                "inputSchema": { "type": "object", "properties": {} },
            },
            {
                "name": TOOL_SEARCH,
                "description": "Search bookmarks by title or URL",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "query": { "type": "string", "description": "Search query" },
                    },
                    "required": ["query"],
                },
            },
        ]
    })
}

async fn write_response<W: AsyncWrite + Unpin>(writer: &mut W, response: &JsonRpcResponse) -> Result<()> {
    let mut frame = serde_json::to_vec(response).map_err(|e| FavsError::parse(e.to_string()))?;
    frame.push(b'\n');
    writer
        .write_all(&frame)
        .await
        .map_err(|e| FavsError::io("<stdout>", e))?;
    writer.flush().await.map_err(|e| FavsError::io("<stdout>", e))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
