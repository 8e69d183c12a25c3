//! Demonstrates using RefSheet as a service locator.
//!
//! Services are registered behind trait objects, so consumers only name the
//! interface they need. Values (plain configuration) live in a ValueSheet next
//! to it, where absent settings fall back to their defaults.
//!
//! Run with: cargo run --example service_locator

use sovran_sheet::{Dispose, RefSheet, SheetError, ValueSheet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

fn main() -> Result<(), SheetError> {
    let services = Arc::new(RefSheet::new());
    let settings = Arc::new(ValueSheet::new());

    // Configuration is plain data
    settings.write(DatabaseConfig {
        host: "localhost".to_string(),
        port: 5432,
        database: "myapp".to_string(),
    });
    settings.write(AppConfig {
        name: "MyApp".to_string(),
        debug: true,
    });

    // Services are shared handles, registered by interface
    services.set::<dyn Logger>(Some(Arc::new(ConsoleLogger::new("app"))));
    services.set_disposable::<ConnectionPool>(Some(Arc::new(ConnectionPool::new(
        &settings.read::<DatabaseConfig>(),
    ))));

    // Named variants of the same interface
    services.set_keyed::<&str, dyn Logger>("audit", Some(Arc::new(ConsoleLogger::new("audit"))));

    let users = UserService::new(Arc::clone(&services), Arc::clone(&settings));
    let orders = OrderService::new(Arc::clone(&services));

    users.create_user("alice")?;
    users.create_user("bob")?;
    orders.create_order("alice", "Widget")?;

    // Settings can change underneath running services
    settings.update(|cfg: &mut AppConfig| cfg.debug = false);
    users.create_user("carol")?;

    // Missing services are reported, not defaulted
    match services.get::<dyn Mailer>() {
        Err(e) if e.is_not_found() => println!("\nNo mailer registered: {}", e),
        Err(e) => return Err(e),
        Ok(_) => println!("\nMailer available"),
    }

    println!("\nShutting down");
    services.dispose();
    Ok(())
}

// ============================================================================
// Configuration - stored as values
// ============================================================================

#[derive(Clone, Debug, Default)]
struct DatabaseConfig {
    host: String,
    port: u16,
    database: String,
}

#[derive(Clone, Debug, Default)]
struct AppConfig {
    name: String,
    debug: bool,
}

// ============================================================================
// Services - stored as references
// ============================================================================

trait Logger: Send + Sync {
    fn log(&self, message: &str);
}

trait Mailer: Send + Sync {
    #[allow(dead_code)]
    fn send(&self, to: &str, body: &str);
}

struct ConsoleLogger {
    prefix: String,
}

impl ConsoleLogger {
    fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
        }
    }
}

impl Logger for ConsoleLogger {
    fn log(&self, message: &str) {
        println!("[{}] {}", self.prefix, message);
    }
}

struct ConnectionPool {
    target: String,
    queries: AtomicU32,
}

impl ConnectionPool {
    fn new(config: &DatabaseConfig) -> Self {
        Self {
            target: format!("{}:{}/{}", config.host, config.port, config.database),
            queries: AtomicU32::new(0),
        }
    }

    fn execute(&self, statement: &str) {
        self.queries.fetch_add(1, Ordering::Relaxed);
        println!("  -> {} on {}", statement, self.target);
    }
}

impl Dispose for ConnectionPool {
    fn dispose(&self) {
        println!(
            "  -> closing pool to {} after {} queries",
            self.target,
            self.queries.load(Ordering::Relaxed)
        );
    }
}

// ============================================================================
// Consumers
// ============================================================================

struct UserService {
    services: Arc<RefSheet>,
    settings: Arc<ValueSheet>,
}

impl UserService {
    fn new(services: Arc<RefSheet>, settings: Arc<ValueSheet>) -> Self {
        Self { services, settings }
    }

    fn create_user(&self, username: &str) -> Result<(), SheetError> {
        let logger = self.services.get::<dyn Logger>()?;
        let audit = self.services.get_keyed::<&str, dyn Logger>(&"audit")?;
        let pool = self.services.get::<ConnectionPool>()?;

        logger.log(&format!("Creating user: {}", username));
        pool.execute("INSERT INTO users");
        audit.log(&format!("user {} created", username));

        let cfg = self.settings.read::<AppConfig>();
        if cfg.debug {
            println!("  -> [DEBUG] {}: user {} created", cfg.name, username);
        }
        Ok(())
    }
}

struct OrderService {
    services: Arc<RefSheet>,
}

impl OrderService {
    fn new(services: Arc<RefSheet>) -> Self {
        Self { services }
    }

    fn create_order(&self, user: &str, item: &str) -> Result<(), SheetError> {
        let logger = self.services.get::<dyn Logger>()?;
        let pool = self.services.get::<ConnectionPool>()?;

        logger.log(&format!("Creating order: {} for {}", item, user));
        pool.execute("INSERT INTO orders");
        Ok(())
    }
}
