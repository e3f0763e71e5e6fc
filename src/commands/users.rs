//! User management commands

use crate::error::{Error, Result};
use crate::store::{ReviewDb, User};
use tracing::info;

/// Register a user
pub async fn cmd_add_user(db: &ReviewDb, username: &str, email: &str) -> Result<User> {
    let username = username.trim();
    let email = email.trim();
    if username.is_empty() {
        return Err(Error::Config("username must not be empty".to_string()));
    }
    if !email.contains('@') {
        return Err(Error::Config(format!("invalid email address: {}", email)));
    }

    let user = db.create_user(username, email).await?;
    info!("Registered user {} (id {})", user.username, user.id);
    Ok(user)
}

pub async fn cmd_list_users(db: &ReviewDb) -> Result<Vec<User>> {
    db.list_users().await
}

pub fn print_users(users: &[User]) {
    println!("\n👤 Users\n");
    if users.is_empty() {
        println!("No users registered. Use 'opinion-miner user add' to add one.");
        return;
    }
    for user in users {
        println!("• {} <{}>", user.username, user.email);
        println!("  Created: {}", user.created_at);
    }
}
