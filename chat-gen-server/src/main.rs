mod config;
mod persist;

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use actix_cors::Cors;
use actix_web::{delete, get, post, put, web, App, HttpResponse, HttpServer, Responder};
use chrono::Utc;
use log::{info, warn};
use serde::Deserialize;

use chat_gen_core::dispatch::{Dispatcher, MessageSink, OutboundMessage};
use chat_gen_core::quotation::{CorpusCatalog, CorpusSource};
use chat_gen_core::scheduler::Action;
use chat_gen_core::store::ConversationStore;
use chat_gen_core::{ConversationId, Engine, EngineError, IncomingMessage, Reply};

use crate::config::Config;
use crate::persist::Persistence;

/// Body of `POST /v1/conversations/{id}/quote`
#[derive(Deserialize, Default)]
#[serde(default)]
struct QuoteRequest {
	words: Option<Vec<String>>,
}

/// Body of `PUT /v1/conversations/{id}/settings`. Missing fields are left unchanged.
#[derive(Deserialize, Default)]
#[serde(default)]
struct SettingsUpdate {
	idle: Option<u32>,
	quote: Option<u32>,
	generate: Option<u32>,
	min_interval: Option<u32>,
	corpus: Option<usize>,
	shorten: Option<bool>,
}

struct SharedData {
	engine: Engine,
	persistence: Persistence,
}

impl SharedData {
	fn flush(&mut self) {
		let Self { engine, persistence } = self;
		persistence.flush(engine.store());
	}
}

/// Stands in for the chat network: keeps delivered replies until fetched.
#[derive(Default)]
struct Outbox {
	replies: Mutex<HashMap<ConversationId, Vec<Reply>>>,
}

impl MessageSink for Outbox {
	fn deliver(&self, message: &OutboundMessage) -> Result<(), String> {
		let mut replies = self.replies.lock().map_err(|_| "outbox lock poisoned".to_owned())?;
		replies.entry(message.conversation_id).or_default().push(message.clone());
		Ok(())
	}
}

fn engine_error(e: EngineError) -> HttpResponse {
	match e {
		EngineError::UnknownConversation(_) => HttpResponse::NotFound().body(e.to_string()),
		EngineError::UnknownCorpus(_) | EngineError::DegenerateCoefficients => {
			HttpResponse::BadRequest().body(e.to_string())
		}
		_ => HttpResponse::InternalServerError().body(e.to_string()),
	}
}

/// HTTP POST endpoint `/v1/conversations/{id}/messages`
///
/// Records the message, then lets the scheduler decide on a reply. A reply
/// is queued for delivery and also returned in the response body.
#[post("/v1/conversations/{id}/messages")]
async fn post_message(
	data: web::Data<Mutex<SharedData>>,
	dispatcher: web::Data<Dispatcher>,
	path: web::Path<ConversationId>,
	message: web::Json<IncomingMessage>,
) -> impl Responder {
	let conversation_id = path.into_inner();
	let mut shared_data = match data.lock() {
		Ok(m) => m,
		Err(_) => return HttpResponse::InternalServerError().body("Engine lock failed"),
	};

	shared_data.engine.ingest(conversation_id, &message);
	let outcome = match shared_data.engine.maybe_act(conversation_id, Utc::now()) {
		Ok(outcome) => outcome,
		Err(e) => return engine_error(e),
	};
	shared_data.persistence.mark_dirty();

	if let Some(reply) = outcome.reply() {
		dispatcher.send(reply.clone());
	}
	HttpResponse::Ok().json(outcome)
}

#[post("/v1/conversations/{id}/quote")]
async fn post_quote(
	data: web::Data<Mutex<SharedData>>,
	dispatcher: web::Data<Dispatcher>,
	path: web::Path<ConversationId>,
	request: Option<web::Json<QuoteRequest>>,
) -> impl Responder {
	let conversation_id = path.into_inner();
	let request = request.map(web::Json::into_inner).unwrap_or_default();
	let mut shared_data = match data.lock() {
		Ok(m) => m,
		Err(_) => return HttpResponse::InternalServerError().body("Engine lock failed"),
	};

	let words = request.words.filter(|words| !words.is_empty());
	match shared_data.engine.force_quote(conversation_id, words.as_deref()) {
		Ok(outcome) => {
			shared_data.persistence.mark_dirty();
			if let Some(reply) = outcome.reply() {
				dispatcher.send(reply.clone());
			}
			HttpResponse::Ok().json(outcome)
		}
		Err(e) => engine_error(e),
	}
}

#[delete("/v1/conversations/{id}/round")]
async fn delete_round(data: web::Data<Mutex<SharedData>>, path: web::Path<ConversationId>) -> impl Responder {
	let mut shared_data = match data.lock() {
		Ok(m) => m,
		Err(_) => return HttpResponse::InternalServerError().body("Engine lock failed"),
	};

	match shared_data.engine.clear_round(path.into_inner()) {
		Ok(()) => {
			shared_data.persistence.mark_dirty();
			HttpResponse::Ok().body("Round cleared")
		}
		Err(e) => engine_error(e),
	}
}

#[get("/v1/conversations/{id}/settings")]
async fn get_settings(data: web::Data<Mutex<SharedData>>, path: web::Path<ConversationId>) -> impl Responder {
	let shared_data = match data.lock() {
		Ok(m) => m,
		Err(_) => return HttpResponse::InternalServerError().body("Engine lock failed"),
	};

	match shared_data.engine.settings(path.into_inner()) {
		Ok(settings) => HttpResponse::Ok().json(settings),
		Err(e) => engine_error(e),
	}
}

/// HTTP PUT endpoint `/v1/conversations/{id}/settings`
///
/// Applies every field present in the body, stopping at the first invalid
/// one. Fields applied before the failure stay applied.
#[put("/v1/conversations/{id}/settings")]
async fn put_settings(
	data: web::Data<Mutex<SharedData>>,
	path: web::Path<ConversationId>,
	update: web::Json<SettingsUpdate>,
) -> impl Responder {
	let conversation_id = path.into_inner();
	let mut shared_data = match data.lock() {
		Ok(m) => m,
		Err(_) => return HttpResponse::InternalServerError().body("Engine lock failed"),
	};

	let result = apply_settings(&mut shared_data.engine, conversation_id, &update);
	shared_data.persistence.mark_dirty();
	match result.and_then(|()| shared_data.engine.settings(conversation_id)) {
		Ok(settings) => HttpResponse::Ok().json(settings),
		Err(e) => engine_error(e),
	}
}

fn apply_settings(engine: &mut Engine, conversation_id: ConversationId, update: &SettingsUpdate) -> Result<(), EngineError> {
	let weights = [
		(Action::Idle, update.idle),
		(Action::Quote, update.quote),
		(Action::Generate, update.generate),
	];
	// Raise weights before lowering others, so {idle: 0, quote: 5} works from {1, 0, 0}
	let (raises, lowers): (Vec<_>, Vec<_>) = weights
		.into_iter()
		.filter_map(|(action, weight)| weight.map(|w| (action, w)))
		.partition(|(_, weight)| *weight > 0);
	for (action, weight) in raises.into_iter().chain(lowers) {
		engine.set_coefficient(conversation_id, action, weight)?;
	}

	if let Some(seconds) = update.min_interval {
		engine.set_min_interval(conversation_id, seconds);
	}
	if let Some(index) = update.corpus {
		engine.select_corpus(conversation_id, index)?;
	}
	if let Some(shorten) = update.shorten {
		engine.set_shorten(conversation_id, shorten);
	}
	Ok(())
}

#[get("/v1/corpora")]
async fn get_corpora(data: web::Data<Mutex<SharedData>>) -> impl Responder {
	let shared_data = match data.lock() {
		Ok(m) => m,
		Err(_) => return HttpResponse::InternalServerError().body("Engine lock failed"),
	};
	HttpResponse::Ok().json(shared_data.engine.catalog().descriptions())
}

/// HTTP GET endpoint `/v1/conversations/{id}/outbox`
///
/// Returns, and forgets, every reply delivered to the conversation so far.
#[get("/v1/conversations/{id}/outbox")]
async fn get_outbox(outbox: web::Data<Outbox>, path: web::Path<ConversationId>) -> impl Responder {
	let mut replies = match outbox.replies.lock() {
		Ok(m) => m,
		Err(_) => return HttpResponse::InternalServerError().body("Outbox lock failed"),
	};
	let delivered = replies.remove(&path.into_inner()).unwrap_or_default();
	HttpResponse::Ok().json(delivered)
}

fn load_catalog(config: &Config) -> CorpusCatalog {
	if let Some(manifest) = &config.corpora {
		match std::fs::read_to_string(manifest)
			.map_err(|e| e.to_string())
			.and_then(|json| serde_json::from_str::<Vec<CorpusSource>>(&json).map_err(|e| e.to_string()))
		{
			Ok(sources) => return CorpusCatalog::load(&config.corpus_dir, &sources),
			Err(e) => warn!("Cannot read corpus list {}: {e}", manifest.display()),
		}
	}
	match CorpusCatalog::discover(&config.corpus_dir) {
		Ok(catalog) => catalog,
		Err(e) => {
			warn!("Cannot list {}: {e}", config.corpus_dir.display());
			CorpusCatalog::from_entries(Vec::new())
		}
	}
}

/// Main entry point for the server.
///
/// Loads the corpora and the saved conversations, wraps the engine in a
/// `Mutex` and starts an Actix-web HTTP server in front of it.
///
/// # Notes
/// - Configuration comes from the environment, see [`Config`]
/// - Replies are delivered by a worker pool into an in-memory outbox
#[actix_web::main]
async fn main() -> std::io::Result<()> {
	dotenv::dotenv().ok();
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

	let config = Config::from_env();
	let catalog = load_catalog(&config);
	info!("{} corpora available", catalog.len());

	let store = match &config.state_path {
		Some(path) => ConversationStore::load(path).map_err(std::io::Error::other)?,
		None => ConversationStore::new(),
	};

	let shared_data = SharedData {
		engine: Engine::with_store(store, catalog, config.engine.clone()),
		persistence: Persistence::new(config.state_path.clone()),
	};
	let shared_engine = web::Data::new(Mutex::new(shared_data));
	if let Some(path) = &config.state_path {
		spawn_autosave(shared_engine.clone(), path, config.save_interval);
	}
	let final_save = shared_engine.clone();

	let outbox = Arc::new(Outbox::default());
	let dispatcher = match config.workers {
		Some(workers) => Dispatcher::spawn(outbox.clone(), workers),
		None => Dispatcher::per_cpu(outbox.clone()),
	};
	let dispatcher = web::Data::new(dispatcher);
	let outbox = web::Data::from(outbox);

	info!("Listening on {}", config.bind);
	let served = HttpServer::new(move || {
		App::new()
			.wrap(Cors::permissive())
			.app_data(shared_engine.clone())
			.app_data(dispatcher.clone())
			.app_data(outbox.clone())
			.service(post_message)
			.service(post_quote)
			.service(delete_round)
			.service(get_settings)
			.service(put_settings)
			.service(get_corpora)
			.service(get_outbox)
	})
		.bind(config.bind.as_str())?
		.run()
		.await;

	match final_save.lock() {
		Ok(mut shared_data) => shared_data.flush(),
		Err(_) => warn!("Engine lock poisoned, last changes are not saved"),
	}
	served
}

/// Saves changed conversations every `interval` seconds, off the request path.
fn spawn_autosave(data: web::Data<Mutex<SharedData>>, path: &Path, interval: u64) {
	info!("Saving conversations to {} every {interval}s", path.display());
	actix_web::rt::spawn(async move {
		let mut ticker = actix_web::rt::time::interval(Duration::from_secs(interval.max(1)));
		loop {
			ticker.tick().await;
			match data.lock() {
				Ok(mut shared_data) => shared_data.flush(),
				Err(_) => {
					warn!("Engine lock poisoned, autosave stops");
					return;
				}
			}
		}
	});
}
