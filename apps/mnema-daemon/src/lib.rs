use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use mnema_providers::{EmbeddingCache, EmbeddingGateway};
use mnema_service::{EventBus, MemoryService, RECORD_STORED};
use mnema_storage::{db::Db, vector::VectorStore};

#[derive(Debug, Parser)]
#[command(version, rename_all = "kebab")]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: std::path::PathBuf,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let cfg = mnema_config::load(&args.config)?;
	let filter = EnvFilter::new(cfg.service.log_level.clone());

	tracing_subscriber::fmt().with_env_filter(filter).init();

	let db = Arc::new(Db::connect(&cfg.storage.postgres).await?);

	db.ensure_schema().await?;

	let vectors = Arc::new(VectorStore::new(&cfg.storage.vector, cfg.documents.clone())?);
	let cache = EmbeddingCache::from_config(&cfg.cache);
	let gateway = Arc::new(EmbeddingGateway::new(cfg.provider.clone(), cache)?);
	let (bus, mut dispatcher) = EventBus::channel(cfg.ingest.queue_capacity);
	let service = MemoryService::new(Arc::new(cfg), db, vectors, gateway, bus);

	dispatcher.subscribe(RECORD_STORED, service.vectorizer());

	let dispatcher_task = tokio::spawn(dispatcher.run());

	tracing::info!("Memory store ready.");

	tokio::signal::ctrl_c().await?;

	tracing::info!("Shutting down.");

	// Dropping the service drops the last bus handle; the dispatcher drains
	// what is queued and stops.
	drop(service);

	let _ = dispatcher_task.await;

	Ok(())
}
