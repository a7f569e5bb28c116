use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use log::{debug, error, info, warn};

use crate::engine::Reply;

/// A reply leaving the engine. Owned, so it never refers back to live state.
pub type OutboundMessage = Reply;

/// Delivery endpoint of composed replies (a chat API client, a log, a test buffer).
pub trait MessageSink: Send + Sync + 'static {
	/// Sends one reply.
	///
	/// # Errors
	/// A human-readable description of the delivery failure. Failures are
	/// logged by the dispatcher and never retried.
	fn deliver(&self, message: &OutboundMessage) -> Result<(), String>;
}

/// Sends replies off the ingestion path.
///
/// # Responsibilities
/// - Queue composed replies without blocking the caller
/// - Deliver them from a fixed pool of worker threads
///
/// # Notes
/// - Replies are owned values; workers never see conversation state
/// - Order is kept per worker only; with several workers two replies of the
///   same conversation may be delivered out of order
/// - Dropping the dispatcher drains the queue before returning
pub struct Dispatcher {
	sender: Option<Sender<OutboundMessage>>,
	workers: Vec<JoinHandle<()>>,
}

impl Dispatcher {
	/// Starts one worker per logical CPU.
	pub fn per_cpu(sink: Arc<dyn MessageSink>) -> Self {
		Self::spawn(sink, num_cpus::get())
	}

	/// Starts `workers` threads (at least one) draining a shared queue.
	pub fn spawn(sink: Arc<dyn MessageSink>, workers: usize) -> Self {
		let (sender, receiver) = mpsc::channel::<OutboundMessage>();
		let receiver = Arc::new(Mutex::new(receiver));

		let workers = (0..workers.max(1))
			.map(|worker| {
				let receiver = Arc::clone(&receiver);
				let sink = Arc::clone(&sink);
				thread::spawn(move || run_worker(worker, &receiver, sink.as_ref()))
			})
			.collect::<Vec<_>>();
		info!("Dispatcher started with {} workers", workers.len());

		Self {
			sender: Some(sender),
			workers,
		}
	}

	/// Queues a reply for delivery.
	pub fn send(&self, reply: OutboundMessage) {
		let Some(sender) = &self.sender else {
			warn!("Dispatcher already shut down, dropping reply to {}", reply.conversation_id);
			return;
		};
		if sender.send(reply).is_err() {
			error!("Every dispatcher worker is gone, reply dropped");
		}
	}

	/// Closes the queue and waits for pending replies to be delivered.
	pub fn shutdown(&mut self) {
		// Workers stop once the queue is closed and empty
		self.sender.take();
		for worker in self.workers.drain(..) {
			if worker.join().is_err() {
				error!("A dispatcher worker panicked");
			}
		}
	}
}

impl Drop for Dispatcher {
	fn drop(&mut self) {
		self.shutdown();
	}
}

fn run_worker(worker: usize, receiver: &Mutex<Receiver<OutboundMessage>>, sink: &dyn MessageSink) {
	loop {
		let next = match receiver.lock() {
			Ok(guard) => guard.recv(),
			Err(_) => {
				error!("Dispatcher queue poisoned, worker {worker} stops");
				return;
			}
		};
		let Ok(reply) = next else {
			debug!("Worker {worker} done");
			return;
		};

		match sink.deliver(&reply) {
			Ok(()) => debug!("Worker {worker} delivered a reply to {}", reply.conversation_id),
			Err(e) => error!("Failed to deliver a reply to {}: {e}", reply.conversation_id),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[derive(Default)]
	struct Collect {
		delivered: Mutex<Vec<Reply>>,
	}

	impl MessageSink for Collect {
		fn deliver(&self, message: &OutboundMessage) -> Result<(), String> {
			if message.text.is_empty() {
				return Err("empty text".to_owned());
			}
			self.delivered.lock().unwrap().push(message.clone());
			Ok(())
		}
	}

	fn reply(conversation_id: i64, text: &str) -> Reply {
		Reply {
			conversation_id,
			reply_to: None,
			text: text.to_owned(),
		}
	}

	#[test]
	fn every_reply_is_delivered_before_shutdown_returns() {
		let sink = Arc::new(Collect::default());
		let mut dispatcher = Dispatcher::spawn(sink.clone(), 3);
		for id in 0..50 {
			dispatcher.send(reply(id, "текст"));
		}
		dispatcher.shutdown();

		let mut ids: Vec<i64> = sink.delivered.lock().unwrap().iter().map(|r| r.conversation_id).collect();
		ids.sort_unstable();
		assert_eq!(ids, (0..50).collect::<Vec<_>>());
	}

	#[test]
	fn failed_delivery_does_not_stop_the_worker() {
		let sink = Arc::new(Collect::default());
		let mut dispatcher = Dispatcher::spawn(sink.clone(), 1);
		dispatcher.send(reply(1, ""));
		dispatcher.send(reply(2, "текст"));
		dispatcher.shutdown();

		assert_eq!(sink.delivered.lock().unwrap().len(), 1);
	}

	#[test]
	fn sending_after_shutdown_is_harmless() {
		let mut dispatcher = Dispatcher::spawn(Arc::new(Collect::default()), 1);
		dispatcher.shutdown();
		dispatcher.send(reply(1, "текст"));
	}
}
