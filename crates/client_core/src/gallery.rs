//! Gallery view over the five remote collections with incremental reveal.

use std::sync::Arc;

use anyhow::{Context, Result};
use api_client::{MediaPayload, ReactionApi};
use shared::domain::{
    Avatar, AvatarId, Background, BackgroundId, Montage, MontageId, Motion, MotionId, Reference,
    ReferenceId,
};
use tracing::info;

/// Page size for the "show more" reveal.
pub const PAGE_SIZE: usize = 12;

/// One collection's in-memory list plus its visible-count window. The whole
/// collection is fetched up front (the API has no server-side paging); the
/// window only controls how much is rendered.
#[derive(Debug, Clone)]
pub struct GalleryList<T> {
    items: Vec<T>,
    visible_count: usize,
    has_add_tile: bool,
}

impl<T> GalleryList<T> {
    fn new(has_add_tile: bool) -> Self {
        Self {
            items: Vec::new(),
            visible_count: Self::initial_visible_count(has_add_tile),
            has_add_tile,
        }
    }

    /// 12 per page, minus one slot when the synthetic "add new" tile sits in
    /// the first position.
    pub fn initial_visible_count(has_add_tile: bool) -> usize {
        if has_add_tile {
            PAGE_SIZE - 1
        } else {
            PAGE_SIZE
        }
    }

    fn replace(&mut self, mut items: Vec<T>) {
        // The API returns newest first; the gallery renders oldest first.
        items.reverse();
        self.items = items;
        self.visible_count = Self::initial_visible_count(self.has_add_tile);
    }

    fn prepend(&mut self, item: T) {
        self.items.insert(0, item);
    }

    fn retain(&mut self, keep: impl FnMut(&T) -> bool) {
        self.items.retain(keep);
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn visible(&self) -> &[T] {
        &self.items[..self.visible_count.min(self.items.len())]
    }

    pub fn has_more(&self) -> bool {
        self.items.len() > self.visible_count
    }

    pub fn show_more(&mut self) {
        self.visible_count = (self.visible_count + PAGE_SIZE).min(self.items.len());
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Fetches and mutates the five collections. Uploads prepend optimistically;
/// deletes drop the record locally once the service confirms.
pub struct Gallery {
    api: Arc<dyn ReactionApi>,
    pub avatars: GalleryList<Avatar>,
    pub references: GalleryList<Reference>,
    pub motions: GalleryList<Motion>,
    pub backgrounds: GalleryList<Background>,
    pub montages: GalleryList<Montage>,
}

impl Gallery {
    pub fn new(api: Arc<dyn ReactionApi>) -> Self {
        Self {
            api,
            // Uploadable collections render an "add new" tile in slot one.
            avatars: GalleryList::new(true),
            references: GalleryList::new(true),
            backgrounds: GalleryList::new(true),
            // Jobs are created by the wizard, not uploaded.
            motions: GalleryList::new(false),
            montages: GalleryList::new(false),
        }
    }

    /// Reloads all five collections concurrently.
    pub async fn refresh_all(&mut self) -> Result<()> {
        let (avatars, references, motions, backgrounds, montages) = futures::try_join!(
            self.api.list_avatars(),
            self.api.list_references(),
            self.api.list_motions(),
            self.api.list_backgrounds(),
            self.api.list_montages(),
        )
        .context("failed to load gallery data")?;
        self.avatars.replace(avatars);
        self.references.replace(references);
        self.motions.replace(motions);
        self.backgrounds.replace(backgrounds);
        self.montages.replace(montages);
        info!(
            avatars = self.avatars.len(),
            references = self.references.len(),
            motions = self.motions.len(),
            backgrounds = self.backgrounds.len(),
            montages = self.montages.len(),
            "gallery refreshed"
        );
        Ok(())
    }

    pub async fn upload_avatar(&mut self, payload: MediaPayload) -> Result<Avatar> {
        let avatar = self.api.upload_avatar(payload).await?;
        self.avatars.prepend(avatar.clone());
        Ok(avatar)
    }

    pub async fn upload_reference(
        &mut self,
        payload: MediaPayload,
        label: &str,
    ) -> Result<Reference> {
        let reference = self.api.upload_reference(payload, label).await?;
        self.references.prepend(reference.clone());
        Ok(reference)
    }

    pub async fn upload_background(
        &mut self,
        payload: MediaPayload,
        title: &str,
    ) -> Result<Background> {
        let background = self.api.upload_background(payload, title).await?;
        self.backgrounds.prepend(background.clone());
        Ok(background)
    }

    pub async fn delete_avatar(&mut self, id: &AvatarId) -> Result<()> {
        self.api.delete_avatar(id).await?;
        self.avatars.retain(|avatar| &avatar.id != id);
        Ok(())
    }

    pub async fn delete_reference(&mut self, id: &ReferenceId) -> Result<()> {
        self.api.delete_reference(id).await?;
        self.references.retain(|reference| &reference.id != id);
        Ok(())
    }

    pub async fn delete_background(&mut self, id: &BackgroundId) -> Result<()> {
        self.api.delete_background(id).await?;
        self.backgrounds.retain(|background| &background.id != id);
        Ok(())
    }

    pub async fn delete_motion(&mut self, id: &MotionId) -> Result<()> {
        self.api.delete_motion(id).await?;
        self.motions.retain(|motion| &motion.id != id);
        Ok(())
    }

    pub async fn delete_montage(&mut self, id: &MontageId) -> Result<()> {
        self.api.delete_montage(id).await?;
        self.montages.retain(|montage| &montage.id != id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(count: usize) -> Vec<u32> {
        (0..count as u32).collect()
    }

    #[test]
    fn add_tile_reserves_one_slot_on_the_first_page() {
        let mut with_tile = GalleryList::<u32>::new(true);
        with_tile.replace(numbered(30));
        assert_eq!(with_tile.visible().len(), 11);

        let mut without_tile = GalleryList::<u32>::new(false);
        without_tile.replace(numbered(30));
        assert_eq!(without_tile.visible().len(), 12);
    }

    #[test]
    fn show_more_grows_by_a_page_and_clamps() {
        let mut list = GalleryList::<u32>::new(false);
        list.replace(numbered(20));
        assert!(list.has_more());

        list.show_more();
        assert_eq!(list.visible().len(), 20);
        assert!(!list.has_more());

        // Growing past the end stays clamped.
        list.show_more();
        assert_eq!(list.visible().len(), 20);
    }

    #[test]
    fn short_lists_are_fully_visible() {
        let mut list = GalleryList::<u32>::new(true);
        list.replace(numbered(3));
        assert_eq!(list.visible().len(), 3);
        assert!(!list.has_more());
    }

    #[test]
    fn replace_reverses_newest_first_order() {
        let mut list = GalleryList::<u32>::new(false);
        list.replace(vec![3, 2, 1]);
        assert_eq!(list.items(), &[1, 2, 3]);
    }

    #[test]
    fn prepend_puts_new_items_first() {
        let mut list = GalleryList::<u32>::new(false);
        list.replace(vec![2, 1]);
        list.prepend(9);
        assert_eq!(list.items(), &[9, 1, 2]);
        assert_eq!(list.visible(), &[9, 1, 2]);
    }
}
