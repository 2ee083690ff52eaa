//! Feed assembly - turns stored rows into hydrated views
//!
//! A page of posts is assembled with one lookup per related entity kind
//! (author members, their users, media, the viewer's likes), whatever the
//! page size. Counts come from the denormalized post columns.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::batch::{load_grouped, load_keyed, unique_ids};
use crate::collaborators::{Collaborators, Member, UserProfile};
use crate::db::models::{parse_id, Comment, Like, MediaAttachment, Post};
use crate::db::{comments, likes, media, posts, FeedDb, PageRequest};
use crate::error::FeedError;
use crate::views::{CommentView, MediaView, PageView, PostView};

use super::access::{require_member, require_post_member};

/// Page size bounds applied to every listing
#[derive(Debug, Clone, Copy)]
pub struct PagingLimits {
    pub default_size: u32,
    pub max_size: u32,
}

impl Default for PagingLimits {
    fn default() -> Self {
        Self {
            default_size: 20,
            max_size: 100,
        }
    }
}

impl PagingLimits {
    /// Validate a client page request; size must be positive and is capped
    pub fn request(&self, page: Option<u32>, size: Option<u32>) -> Result<PageRequest, FeedError> {
        let size = size.unwrap_or(self.default_size);
        if size == 0 {
            return Err(FeedError::Validation("Page size must be greater than zero".into()));
        }
        Ok(PageRequest::new(page.unwrap_or(0), size.min(self.max_size)))
    }
}

/// Read-path service producing post and comment views
pub struct FeedService {
    db: Arc<FeedDb>,
    collaborators: Collaborators,
    paging: PagingLimits,
}

impl FeedService {
    pub fn new(db: Arc<FeedDb>, collaborators: Collaborators, paging: PagingLimits) -> Self {
        Self {
            db,
            collaborators,
            paging,
        }
    }

    // =========================================================================
    // Listings
    // =========================================================================

    /// Newest-first page of a group's feed
    pub fn list_group_feed(
        &self,
        caller: Uuid,
        group_id: Uuid,
        page: Option<u32>,
        size: Option<u32>,
    ) -> Result<PageView<PostView>, FeedError> {
        let viewer = require_member(self.collaborators.membership.as_ref(), caller, group_id)?;
        let request = self.paging.request(page, size)?;
        let gid = group_id.to_string();

        let (rows, total) = self.db.with_conn(|conn| {
            let rows = posts::list_group_posts(conn, &gid, request)?;
            let total = posts::count_group_posts(conn, &gid)?;
            Ok((rows, total))
        })?;

        debug!(group_id = %gid, page = request.page, rows = rows.len(), "Listed group feed");
        let items = self.assemble_page(rows, &viewer)?;
        Ok(page_view(items, request, total))
    }

    /// Newest-first page of one member's posts in a group
    pub fn list_member_posts(
        &self,
        caller: Uuid,
        group_id: Uuid,
        author_member_id: Uuid,
        page: Option<u32>,
        size: Option<u32>,
    ) -> Result<PageView<PostView>, FeedError> {
        let viewer = require_member(self.collaborators.membership.as_ref(), caller, group_id)?;
        let request = self.paging.request(page, size)?;
        let gid = group_id.to_string();
        let author = author_member_id.to_string();

        let (rows, total) = self.db.with_conn(|conn| {
            let rows = posts::list_member_posts(conn, &gid, &author, request)?;
            let total = posts::count_member_posts(conn, &gid, &author)?;
            Ok((rows, total))
        })?;

        let items = self.assemble_page(rows, &viewer)?;
        Ok(page_view(items, request, total))
    }

    /// A single live post
    pub fn get_post(&self, caller: Uuid, post_id: &str) -> Result<PostView, FeedError> {
        let post = self.db.with_conn(|conn| posts::get_live_post(conn, post_id))?;
        let viewer = require_post_member(self.collaborators.membership.as_ref(), caller, &post)?;
        self.assemble_one(post, &viewer)
    }

    /// Oldest-first page of a live post's comments
    pub fn list_post_comments(
        &self,
        caller: Uuid,
        post_id: &str,
        page: Option<u32>,
        size: Option<u32>,
    ) -> Result<PageView<CommentView>, FeedError> {
        let post = self.db.with_conn(|conn| posts::get_live_post(conn, post_id))?;
        require_post_member(self.collaborators.membership.as_ref(), caller, &post)?;
        let request = self.paging.request(page, size)?;

        let (rows, total) = self.db.with_conn(|conn| {
            let rows = comments::list_post_comments(conn, post_id, request)?;
            let total = comments::count_post_comments(conn, post_id)?;
            Ok((rows, total))
        })?;

        let items = self.assemble_comments(rows)?;
        Ok(page_view(items, request, total))
    }

    // =========================================================================
    // Assembly
    // =========================================================================

    /// Hydrate a page of posts with a bounded number of lookups
    pub fn assemble_page(
        &self,
        rows: Vec<Post>,
        viewer: &Member,
    ) -> Result<Vec<PostView>, FeedError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let (members, users) =
            self.load_authors(unique_ids(&rows, |p| p.author_member_id.clone()))?;
        let post_ids: Vec<String> = rows.iter().map(|p| p.id.clone()).collect();
        let viewer_id = viewer.id.to_string();

        let (mut media_by_post, liked) = self.db.with_conn(|conn| {
            let media_by_post = load_grouped(
                &post_ids,
                |ids| media::media_for_posts(conn, ids),
                |m: &MediaAttachment| m.post_id.clone(),
            )?;
            let liked: HashSet<String> = load_keyed(
                &post_ids,
                |ids| likes::likes_for_member(conn, &viewer_id, ids),
                |l: &Like| l.post_id.clone(),
            )?
            .into_keys()
            .collect();
            Ok((media_by_post, liked))
        })?;

        Ok(rows
            .into_iter()
            .map(|post| {
                let media = media_by_post.remove(&post.id).unwrap_or_default();
                let is_liked = liked.contains(&post.id);
                let member = parse_id(&post.author_member_id)
                    .ok()
                    .and_then(|id| members.get(&id));
                let user = member.and_then(|m| users.get(&m.user_id));
                self.build_post_view(post, member, user, media, is_liked)
            })
            .collect())
    }

    /// Hydrate one post independently of any page
    pub fn assemble_one(&self, post: Post, viewer: &Member) -> Result<PostView, FeedError> {
        let member = parse_id(&post.author_member_id)
            .ok()
            .and_then(|id| self.collaborators.membership.get_members(&[id]).into_iter().next());
        let user = member
            .as_ref()
            .and_then(|m| self.collaborators.identity.get_user(m.user_id));

        let viewer_id = viewer.id.to_string();
        let (media, is_liked) = self.db.with_conn(|conn| {
            let media = media::media_for_post(conn, &post.id)?;
            let is_liked = likes::has_liked(conn, &post.id, &viewer_id)?;
            Ok((media, is_liked))
        })?;

        Ok(self.build_post_view(post, member.as_ref(), user.as_ref(), media, is_liked))
    }

    /// View of a post straight from the rows its create unit returned
    ///
    /// Performs no store reads, so a committed post always yields its view.
    pub fn assemble_created(
        &self,
        post: Post,
        media: Vec<MediaAttachment>,
        author: &Member,
    ) -> PostView {
        let user = self.collaborators.identity.get_user(author.user_id);
        self.build_post_view(post, Some(author), user.as_ref(), media, false)
    }

    /// Attach author names to comments with one member and one user lookup
    pub fn assemble_comments(&self, rows: Vec<Comment>) -> Result<Vec<CommentView>, FeedError> {
        let (members, users) =
            self.load_authors(unique_ids(&rows, |c| c.author_member_id.clone()))?;

        Ok(rows
            .into_iter()
            .map(|comment| {
                let member = parse_id(&comment.author_member_id)
                    .ok()
                    .and_then(|id| members.get(&id));
                let display_name = member.and_then(|m| m.display_name.clone());
                let name = member
                    .and_then(|m| users.get(&m.user_id))
                    .and_then(|u| u.name.clone());
                CommentView::new(comment, display_name, name)
            })
            .collect())
    }

    fn load_authors(
        &self,
        author_ids: Vec<String>,
    ) -> Result<(HashMap<Uuid, Member>, HashMap<Uuid, UserProfile>), FeedError> {
        let member_ids: Vec<Uuid> = author_ids
            .iter()
            .filter_map(|id| parse_id(id).ok())
            .collect();

        let members = load_keyed(
            &member_ids,
            |ids| Ok::<_, FeedError>(self.collaborators.membership.get_members(ids)),
            |m: &Member| m.id,
        )?;

        let member_list: Vec<&Member> = members.values().collect();
        let user_ids = unique_ids(&member_list, |m| m.user_id);
        let users = load_keyed(
            &user_ids,
            |ids| Ok::<_, FeedError>(self.collaborators.identity.get_users(ids)),
            |u: &UserProfile| u.id,
        )?;

        Ok((members, users))
    }

    fn build_post_view(
        &self,
        post: Post,
        author: Option<&Member>,
        user: Option<&UserProfile>,
        media: Vec<MediaAttachment>,
        is_liked_by_user: bool,
    ) -> PostView {
        let media = media
            .into_iter()
            .map(|m| {
                let url = self.collaborators.media.playable_url(&m.object_key, &post.group_id);
                MediaView::new(m, url)
            })
            .collect();

        PostView {
            author_display_name: author.and_then(|m| m.display_name.clone()),
            author_name: user.and_then(|u| u.name.clone()),
            id: post.id,
            group_id: post.group_id,
            author_member_id: post.author_member_id,
            event_id: post.event_id,
            content_text: post.content_text,
            visibility: post.visibility,
            media_count: post.media_count,
            media,
            like_count: post.like_count,
            comment_count: post.comment_count,
            is_liked_by_user,
            created_at: post.created_at,
            updated_at: post.updated_at,
        }
    }
}

fn page_view<T>(items: Vec<T>, request: PageRequest, total: i64) -> PageView<T> {
    PageView {
        items,
        page: request.page,
        size: request.size,
        total_elements: total,
        total_pages: request.total_pages(total),
    }
}
