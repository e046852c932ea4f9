//! Command handler for the RESP server

use std::sync::Arc;

use shelfdb::{BookStore, NewBook};
use shelfsearch::{Keyspace, SearchBench};
use tracing::debug;

use crate::resp::Frame;

/// Dispatches parsed commands against the catalog
pub struct CommandHandler {
    store: Arc<BookStore>,
    bench: Arc<SearchBench>,
}

impl CommandHandler {
    pub fn new(store: Arc<BookStore>, bench: Arc<SearchBench>) -> Self {
        Self { store, bench }
    }

    pub fn handle(&self, frame: Frame) -> Frame {
        let Some(args) = frame.into_args() else {
            return Frame::error("invalid command format");
        };

        let command = String::from_utf8_lossy(&args[0]).to_uppercase();
        let args = &args[1..];
        debug!(%command, argc = args.len(), "command");

        match command.as_str() {
            "PING" => self.handle_ping(args),
            "SEARCH" => self.handle_search(args),
            "INVALIDATE" => self.handle_invalidate(args),
            "ADD" => self.handle_add(args),
            "GET" => self.handle_get(args),
            "LIST" => self.handle_list(),
            "DBSIZE" => Frame::Integer(self.store.len() as i64),
            "INFO" => self.handle_info(),
            // redis-cli probes this on connect
            "COMMAND" => Frame::Array(Some(vec![])),
            _ => Frame::error(format!("unknown command '{}'", command)),
        }
    }

    fn handle_ping(&self, args: &[Vec<u8>]) -> Frame {
        match args {
            [] => Frame::Simple("PONG".to_string()),
            [msg] => Frame::bulk(msg.clone()),
            _ => wrong_arity("ping"),
        }
    }

    fn handle_search(&self, args: &[Vec<u8>]) -> Frame {
        if args.is_empty() {
            return wrong_arity("search");
        }

        // Inline clients split multi-word titles; rejoin them
        let term = args
            .iter()
            .map(|a| String::from_utf8_lossy(a))
            .collect::<Vec<_>>()
            .join(" ");

        let report = self.bench.search(&term);
        match serde_json::to_vec(&report) {
            Ok(json) => Frame::bulk(json),
            Err(e) => Frame::error(e),
        }
    }

    fn handle_invalidate(&self, args: &[Vec<u8>]) -> Frame {
        if !args.is_empty() {
            return wrong_arity("invalidate");
        }
        self.bench.invalidate_cache();
        Frame::ok()
    }

    fn handle_add(&self, args: &[Vec<u8>]) -> Frame {
        let (title, author, description) = match args {
            [title, author] => (title, author, None),
            [title, author, description] => (title, author, Some(description)),
            _ => return wrong_arity("add"),
        };

        let new_book = NewBook::new(
            String::from_utf8_lossy(title),
            String::from_utf8_lossy(author),
            description.map(|d| String::from_utf8_lossy(d).into_owned()),
        );

        match self.store.insert(new_book) {
            Ok(book) => Frame::Integer(book.id as i64),
            Err(e) => Frame::error(e),
        }
    }

    fn handle_get(&self, args: &[Vec<u8>]) -> Frame {
        let [id] = args else {
            return wrong_arity("get");
        };

        let Some(id) = std::str::from_utf8(id).ok().and_then(|s| s.parse::<u64>().ok()) else {
            return Frame::null();
        };

        match self.store.find_by_id(id) {
            Ok(Some(book)) => match serde_json::to_vec(&book) {
                Ok(json) => Frame::bulk(json),
                Err(e) => Frame::error(e),
            },
            Ok(None) => Frame::null(),
            Err(e) => Frame::error(e),
        }
    }

    fn handle_list(&self) -> Frame {
        let books = match self.store.read_all() {
            Ok(books) => books,
            Err(e) => return Frame::error(e),
        };

        let mut items = Vec::with_capacity(books.len());
        for book in &books {
            match serde_json::to_vec(book) {
                Ok(json) => items.push(Frame::bulk(json)),
                Err(e) => return Frame::error(e),
            }
        }
        Frame::Array(Some(items))
    }

    fn handle_info(&self) -> Frame {
        let cache = self.bench.cache();

        let mut info = format!(
            "# Server\r\n\
             shelfd_version:{}\r\n\
             \r\n\
             # Store\r\n\
             total_books:{}\r\n\
             \r\n\
             # IndexCache\r\n\
             cache_invalidations:{}\r\n",
            env!("CARGO_PKG_VERSION"),
            self.store.len(),
            cache.stats().invalidations(),
        );

        for keyspace in [Keyspace::ById, Keyspace::ByTitle] {
            let stats = cache.stats().keyspace(keyspace);
            let entries = cache
                .len(keyspace)
                .map(|n| n.to_string())
                .unwrap_or_else(|| "absent".to_string());

            info.push_str(&format!(
                "{ks}:{}\r\n\
                 {ks}_hits:{}\r\n\
                 {ks}_builds:{}\r\n\
                 {ks}_failed_builds:{}\r\n\
                 {ks}_build_ms:{:.3}\r\n\
                 {ks}_hit_ratio:{:.2}\r\n",
                entries,
                stats.hits,
                stats.builds,
                stats.failed_builds,
                stats.build_time.as_secs_f64() * 1000.0,
                stats.hit_ratio(),
                ks = keyspace,
            ));
        }

        Frame::bulk(info)
    }
}

fn wrong_arity(command: &str) -> Frame {
    Frame::error(format!("wrong number of arguments for '{}' command", command))
}
