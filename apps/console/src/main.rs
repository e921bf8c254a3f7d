use std::{path::PathBuf, sync::Arc};

use anyhow::{anyhow, Result};
use api_client::{HttpReactionApi, MediaPayload, ReactionApi};
use clap::{Parser, Subcommand, ValueEnum};
use client_core::{
    gallery::Gallery, media_cache::MediaCache, SessionEvent, WizardSession,
};
use shared::domain::{
    AvatarId, BackgroundId, MontageId, MotionId, ReferenceId,
};
use tokio::sync::broadcast::error::RecvError;

mod config;

#[derive(Parser, Debug)]
#[command(name = "reaction", about = "Drive the avatar montage service from the terminal")]
struct Args {
    /// Overrides the configured API base url.
    #[arg(long)]
    api_base_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Lists the avatars, motion references, and backgrounds available to
    /// the wizard.
    Catalog,
    /// Shows all five collections the way the gallery pages them.
    Gallery,
    /// Uploads an avatar image (PNG or JPEG).
    UploadAvatar { path: PathBuf },
    /// Uploads a motion reference clip (MP4) with its display label.
    UploadReference {
        path: PathBuf,
        #[arg(long)]
        label: String,
    },
    /// Uploads a background clip (MP4) with its display title.
    UploadBackground {
        path: PathBuf,
        #[arg(long)]
        title: String,
    },
    /// Deletes one remote record by id.
    Delete {
        #[arg(value_enum)]
        resource: Resource,
        id: String,
    },
    /// Runs the full wizard: motion generation, then montage composition.
    Generate {
        #[arg(long)]
        avatar: String,
        #[arg(long)]
        reference: String,
        #[arg(long)]
        background: String,
        /// Downloads the finished montage to this path.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Resolves a media url through the local cache and prints its location.
    Preview { url: String },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Resource {
    Avatar,
    Reference,
    Background,
    Motion,
    Montage,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let args = Args::parse();
    let mut settings = config::load_settings();
    if let Some(base_url) = args.api_base_url {
        settings.api_base_url = base_url;
    }
    let api = Arc::new(HttpReactionApi::new(&settings.api_base_url)?);

    match args.command {
        Command::Catalog => catalog(api).await,
        Command::Gallery => gallery(api).await,
        Command::UploadAvatar { path } => {
            let payload = MediaPayload::from_path(&path).await?;
            let avatar = api.upload_avatar(payload).await?;
            println!("uploaded avatar {} ({})", avatar.id, avatar.name);
            Ok(())
        }
        Command::UploadReference { path, label } => {
            let payload = MediaPayload::from_path(&path).await?;
            let reference = api.upload_reference(payload, &label).await?;
            println!(
                "uploaded reference {} ({})",
                reference.id,
                reference.display_name()
            );
            Ok(())
        }
        Command::UploadBackground { path, title } => {
            let payload = MediaPayload::from_path(&path).await?;
            let background = api.upload_background(payload, &title).await?;
            println!(
                "uploaded background {} ({})",
                background.id,
                background.display_name()
            );
            Ok(())
        }
        Command::Delete { resource, id } => {
            match resource {
                Resource::Avatar => api.delete_avatar(&AvatarId::new(&id)).await?,
                Resource::Reference => api.delete_reference(&ReferenceId::new(&id)).await?,
                Resource::Background => api.delete_background(&BackgroundId::new(&id)).await?,
                Resource::Motion => api.delete_motion(&MotionId::new(&id)).await?,
                Resource::Montage => api.delete_montage(&MontageId::new(&id)).await?,
            }
            println!("deleted {resource:?} {id}");
            Ok(())
        }
        Command::Generate {
            avatar,
            reference,
            background,
            output,
        } => generate(api, avatar, reference, background, output).await,
        Command::Preview { url } => {
            let cache = MediaCache::new(&settings.cache_dir);
            let source = cache.resolve(&url).await;
            println!("{}", source.location());
            Ok(())
        }
    }
}

async fn catalog(api: Arc<HttpReactionApi>) -> Result<()> {
    let session = WizardSession::new(api);
    let catalog = session.load_catalog().await?;
    println!("avatars ({}):", catalog.avatars.len());
    for avatar in &catalog.avatars {
        println!("  {}  {}", avatar.id, avatar.name);
    }
    println!("references ({}):", catalog.references.len());
    for reference in &catalog.references {
        println!("  {}  {}", reference.id, reference.display_name());
    }
    println!("backgrounds ({}):", catalog.backgrounds.len());
    for background in &catalog.backgrounds {
        println!("  {}  {}", background.id, background.display_name());
    }
    Ok(())
}

async fn gallery(api: Arc<HttpReactionApi>) -> Result<()> {
    let mut gallery = Gallery::new(api);
    gallery.refresh_all().await?;
    print_page("avatars", gallery.avatars.visible().len(), gallery.avatars.len());
    for avatar in gallery.avatars.visible() {
        println!("  {}  {}", avatar.id, avatar.name);
    }
    print_page(
        "references",
        gallery.references.visible().len(),
        gallery.references.len(),
    );
    for reference in gallery.references.visible() {
        println!("  {}  {}", reference.id, reference.display_name());
    }
    print_page("motions", gallery.motions.visible().len(), gallery.motions.len());
    for motion in gallery.motions.visible() {
        println!("  {}  {:?}", motion.id, motion.status);
    }
    print_page(
        "backgrounds",
        gallery.backgrounds.visible().len(),
        gallery.backgrounds.len(),
    );
    for background in gallery.backgrounds.visible() {
        println!("  {}  {}", background.id, background.display_name());
    }
    print_page(
        "montages",
        gallery.montages.visible().len(),
        gallery.montages.len(),
    );
    for montage in gallery.montages.visible() {
        println!("  {}  {:?}", montage.id, montage.status);
    }
    Ok(())
}

fn print_page(name: &str, visible: usize, total: usize) {
    if visible < total {
        println!("{name} (showing {visible} of {total}):");
    } else {
        println!("{name} ({total}):");
    }
}

/// Runs both jobs back to back, printing each status update as the poll
/// reports it.
async fn generate(
    api: Arc<HttpReactionApi>,
    avatar: String,
    reference: String,
    background: String,
    output: Option<PathBuf>,
) -> Result<()> {
    let session = WizardSession::new(Arc::clone(&api) as Arc<dyn ReactionApi>);
    let catalog = session.load_catalog().await?;

    let avatar = catalog
        .avatars
        .into_iter()
        .find(|candidate| candidate.id.as_str() == avatar)
        .ok_or_else(|| anyhow!("no avatar with id '{avatar}'"))?;
    let reference = catalog
        .references
        .into_iter()
        .find(|candidate| candidate.id.as_str() == reference)
        .ok_or_else(|| anyhow!("no reference with id '{reference}'"))?;
    let background = catalog
        .backgrounds
        .into_iter()
        .find(|candidate| candidate.id.as_str() == background)
        .ok_or_else(|| anyhow!("no background with id '{background}'"))?;

    let mut events = session.subscribe_events();
    session.select_avatar(avatar).await;
    session.select_reference(reference).await;
    session.select_background(background).await;

    session.start_motion_generation().await?;
    println!("motion job submitted; checking status every 15s");
    wait_for(&mut events, |event| match event {
        SessionEvent::MotionUpdated(motion) => {
            println!("  motion {}: {:?}", motion.id, motion.status);
            None
        }
        SessionEvent::MotionReady(motion) => {
            println!("motion ready: {}", motion.output_url().unwrap_or_default());
            Some(Ok(()))
        }
        SessionEvent::Error(message) => Some(Err(anyhow!(message))),
        _ => None,
    })
    .await?;

    session.start_montage_generation().await?;
    println!("montage job submitted; checking status every 15s");
    wait_for(&mut events, |event| match event {
        SessionEvent::MontageUpdated(montage) => {
            println!("  montage {}: {:?}", montage.id, montage.status);
            None
        }
        SessionEvent::MontageReady(montage) => {
            println!(
                "montage ready: {}",
                montage.output_url().unwrap_or_default()
            );
            Some(Ok(()))
        }
        SessionEvent::Error(message) => Some(Err(anyhow!(message))),
        _ => None,
    })
    .await?;

    if let Some(payload) = session.share_payload().await {
        println!("share: {}", serde_json::to_string(&payload)?);
        if let Some(destination) = output {
            let bytes = api.download(&payload.url, &destination).await?;
            println!("saved {bytes} bytes to {}", destination.display());
        }
    }
    Ok(())
}

/// Drains session events until the callback yields a verdict.
async fn wait_for(
    events: &mut tokio::sync::broadcast::Receiver<SessionEvent>,
    mut verdict: impl FnMut(SessionEvent) -> Option<Result<()>>,
) -> Result<()> {
    loop {
        match events.recv().await {
            Ok(event) => {
                if let Some(outcome) = verdict(event) {
                    return outcome;
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "event stream lagged");
            }
            Err(RecvError::Closed) => {
                return Err(anyhow!("session event stream closed unexpectedly"));
            }
        }
    }
}
