#![deny(dead_code)]
use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use log::{error, info, LevelFilter};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

mod ui;
mod utils;

use crate::ui::{parse_command, Command};
use verichat::backend::{BackendService, Review};
use verichat::chat::{seed, ChatStore, ConversationStore};
use verichat::config::{self, AppConfig};
use verichat::models::CurrentUser;

/// Command line arguments for verichat
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "verichat: chat console and review client.",
    long_about = "verichat runs a local chat console with simulated delivery receipts, \
    and talks to the hosted review service for accounts, restaurants and reviews.\n\n\
    The service is configured with VERICHAT_BACKEND_URL and VERICHAT_ANON_KEY \
    or the config file."
)]
struct Args {
    /// Config file to use instead of the default location
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Write logs to this file instead of stderr
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    #[arg(long, default_value = "warn")]
    log_level: LevelFilter,

    /// Start with an empty conversation list
    #[arg(long)]
    no_seed: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Interactive chat console (default)
    Chat,
    #[command(flatten)]
    Service(ServiceCommand),
}

/// Commands that talk to the hosted review service
#[derive(Subcommand, Debug)]
enum ServiceCommand {
    /// Create an account
    SignUp {
        email: String,
        first_name: String,
        last_name: String,
    },
    /// Sign in and remember the session
    SignIn { email: String },
    /// Forget the stored session
    SignOut,
    /// Show or update your profile
    Profile {
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
    },
    /// List restaurants, or show one with its reviews
    Restaurants { id: Option<String> },
    /// List your reviews
    Reviews,
    /// Review a restaurant
    Review {
        restaurant_id: String,
        rating: u8,
        text: String,
    },
    /// Change one of your reviews
    EditReview {
        review_id: String,
        rating: u8,
        text: String,
    },
    /// Delete one of your reviews
    DeleteReview { review_id: String },
}

/// Password from VERICHAT_PASSWORD, otherwise prompted
fn prompt_password(prompt: &str) -> Result<String> {
    if let Ok(password) = env::var("VERICHAT_PASSWORD") {
        return Ok(password);
    }
    eprintln!("{}", prompt);
    utils::read_line()
}

fn print_review(review: &Review) {
    let restaurant = review
        .restaurant
        .as_ref()
        .map(|r| r.name.clone())
        .or_else(|| review.restaurant_id.clone())
        .unwrap_or_default();
    let author = review
        .author
        .as_ref()
        .map(|a| {
            format!(
                "{} {}",
                a.first_name.as_deref().unwrap_or(""),
                a.last_name.as_deref().unwrap_or("")
            )
            .trim()
            .to_string()
        })
        .unwrap_or_default();
    println!(
        "  {} {} {}/5 {} {}",
        review.id, restaurant, review.rating, review.review_text, author
    );
}

async fn run_chat(config: &AppConfig, no_seed: bool) -> Result<()> {
    let me: CurrentUser = config.user.clone();
    let store = if config.seed_demo_data && !no_seed {
        seed::demo_store(&me)
    } else {
        ConversationStore::new(seed::contacts(), Vec::new())
    };
    let (chat, mut events) = ChatStore::new(store, config.timings()?);
    info!("Chat console started for {}", me.id);

    println!("{}", ui::HELP);
    println!("{}", ui::render_conversations(&chat.conversations().await, chat.selected_id().await.as_deref()));
    if let Some(conversation) = chat.selected().await {
        println!("{}", ui::render_conversation(&conversation));
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim().is_empty() {
                    continue;
                }
                let command = match parse_command(&line) {
                    Ok(command) => command,
                    Err(e) => {
                        println!("{}", e);
                        continue;
                    }
                };
                if command == Command::Quit {
                    break;
                }
                if let Err(e) = handle_command(&chat, &me, command).await {
                    println!("{}", e);
                }
            }
            Some(event) = events.recv() => {
                if let Some(line) = ui::render_event(&event) {
                    println!("{}", line);
                }
            }
        }
    }

    info!("Chat console closed");
    Ok(())
}

async fn handle_command(chat: &ChatStore, me: &CurrentUser, command: Command) -> Result<()> {
    match command {
        Command::Help => println!("{}", ui::HELP),
        Command::List => {
            let selected = chat.selected_id().await;
            println!("{}", ui::render_conversations(&chat.conversations().await, selected.as_deref()));
        }
        Command::Contacts => println!("{}", ui::render_contacts(&chat.contacts().await)),
        Command::Show => match chat.selected().await {
            Some(conversation) => println!("{}", ui::render_conversation(&conversation)),
            None => println!("No conversation selected."),
        },
        Command::Open(id) => {
            chat.select(Some(&id)).await?;
            show_selected(chat).await;
        }
        Command::New(contact_id) => {
            chat.start_direct(me, &contact_id).await?;
            show_selected(chat).await;
        }
        Command::Group { name, members } => {
            chat.create_group(me, &name, &members).await?;
            show_selected(chat).await;
        }
        Command::Delete(id) => {
            chat.delete(&id).await?;
            match chat.selected_id().await {
                Some(selected) => println!("Now viewing {}", selected),
                None => println!("No conversations left."),
            }
        }
        Command::Reply { to, text } => send(chat, me, &text, Some(&to)).await?,
        Command::Send(text) => send(chat, me, &text, None).await?,
        Command::Quit => {}
    }
    Ok(())
}

async fn send(chat: &ChatStore, me: &CurrentUser, text: &str, reply_to: Option<&str>) -> Result<()> {
    let conversation_id = chat
        .selected_id()
        .await
        .ok_or_else(|| anyhow!("Open a conversation first (/list, /open <id>)"))?;
    let message_id = chat.send_message(me, &conversation_id, text, reply_to).await?;
    if let Some(conversation) = chat.conversation(&conversation_id).await {
        if let Some(message) = conversation.message(&message_id) {
            println!("{}", ui::render_message(message));
        }
    }
    Ok(())
}

async fn show_selected(chat: &ChatStore) {
    if let Some(conversation) = chat.selected().await {
        println!("{}", ui::render_conversation(&conversation));
    }
}

async fn run_backend_command(mut config: AppConfig, command: ServiceCommand) -> Result<()> {
    let service = BackendService::new(Arc::new(config.backend()?));

    let result = dispatch(&service, command).await;

    // Sign-in, sign-out and token refreshes all show up here
    if config.remember_session(service.session().await.as_ref()) {
        config::save_config(&config)?;
    }
    result
}

async fn dispatch(service: &BackendService, command: ServiceCommand) -> Result<()> {
    match command {
        ServiceCommand::SignUp { email, first_name, last_name } => {
            let password = prompt_password("Choose a password:")?;
            let confirm = prompt_password("Confirm password:")?;
            match service.sign_up(&email, &password, &confirm, &first_name, &last_name).await {
                Ok(session) if session.access_token.is_some() => println!("Account created and signed in."),
                Ok(_) => println!("Account created. Check your email to confirm it, then sign in."),
                Err(failure) => return Err(anyhow!(failure.user_message())),
            }
        }
        ServiceCommand::SignIn { email } => {
            let password = prompt_password(&format!("Password for {}:", email))?;
            match service.sign_in(&email, &password).await {
                Ok(session) => println!("Signed in as {}", session.email.as_deref().unwrap_or(&session.user_id)),
                Err(failure) => return Err(anyhow!(failure.user_message())),
            }
        }
        ServiceCommand::SignOut => {
            if !service.sign_out().await {
                println!("The service did not confirm sign-out; the local session is cleared anyway.");
            }
            println!("Signed out.");
        }
        ServiceCommand::Profile { first_name, last_name } => {
            let profile = match (first_name, last_name) {
                (None, None) => service.current_profile().await,
                (first, last) => {
                    let current = service.current_profile().await;
                    let first = first
                        .or_else(|| current.as_ref().and_then(|p| p.first_name.clone()))
                        .unwrap_or_default();
                    let last = last
                        .or_else(|| current.as_ref().and_then(|p| p.last_name.clone()))
                        .unwrap_or_default();
                    service.update_profile(&first, &last).await
                }
            };
            match profile {
                Some(profile) => println!("{} <{}>", profile.display_name(), profile.email.unwrap_or_default()),
                None => println!("No profile available. Are you signed in?"),
            }
        }
        ServiceCommand::Restaurants { id: None } => {
            let restaurants = service.restaurants().await;
            if restaurants.is_empty() {
                println!("No restaurants found.");
            }
            for restaurant in restaurants {
                println!("  {} {}", restaurant.id, restaurant.name);
            }
        }
        ServiceCommand::Restaurants { id: Some(id) } => match service.restaurant_with_reviews(&id).await {
            Some(restaurant) => {
                println!("{} ({} reviews)", restaurant.name, restaurant.reviews.len());
                for review in &restaurant.reviews {
                    print_review(review);
                }
            }
            None => println!("Restaurant {} not found.", id),
        },
        ServiceCommand::Reviews => {
            let reviews = service.user_reviews().await;
            if reviews.is_empty() {
                println!("You have not written any reviews.");
            }
            for review in &reviews {
                print_review(review);
            }
        }
        ServiceCommand::Review { restaurant_id, rating, text } => {
            match service.add_review(&restaurant_id, rating, &text).await {
                Some(review) => print_review(&review),
                None => println!("Could not add the review."),
            }
        }
        ServiceCommand::EditReview { review_id, rating, text } => {
            match service.update_review(&review_id, rating, &text).await {
                Some(review) => print_review(&review),
                None => println!("Could not update review {}.", review_id),
            }
        }
        ServiceCommand::DeleteReview { review_id } => {
            if service.delete_review(&review_id).await {
                println!("Deleted review {}.", review_id);
            } else {
                println!("Could not delete review {}.", review_id);
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    utils::setup_logging(args.log_file.as_deref().and_then(|p| p.to_str()), args.log_level)?;
    info!("verichat starting up");
    info!("System information: {} {}", std::env::consts::OS, std::env::consts::ARCH);

    if let Some(path) = &args.config {
        config::set_config_path_override(path.clone());
        info!("Config path overridden to: {}", path.display());
    }

    let config = match config::load_config() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load config: {:#}", e);
            return Err(e);
        }
    };

    match args.command.unwrap_or(Commands::Chat) {
        Commands::Chat => run_chat(&config, args.no_seed).await,
        Commands::Service(command) => run_backend_command(config, command).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_commands_parse_under_the_top_level() {
        let args = Args::try_parse_from(["verichat", "sign-out"]).unwrap();
        assert!(matches!(args.command, Some(Commands::Service(ServiceCommand::SignOut))));

        let args = Args::try_parse_from(["verichat", "review", "rest1", "4", "Lovely broth"]).unwrap();
        match args.command {
            Some(Commands::Service(ServiceCommand::Review { restaurant_id, rating, .. })) => {
                assert_eq!(restaurant_id, "rest1");
                assert_eq!(rating, 4);
            }
            other => panic!("Expected a review command, got {:?}", other),
        }

        let args = Args::try_parse_from(["verichat", "chat"]).unwrap();
        assert!(matches!(args.command, Some(Commands::Chat)));
        assert!(Args::try_parse_from(["verichat"]).unwrap().command.is_none());
    }
}
