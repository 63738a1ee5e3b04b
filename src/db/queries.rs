use chrono::{NaiveDateTime, Utc};
use rusqlite::{params, Connection};

use crate::models::{
    AppealStatus, Booking, BookingStatus, Category, HomepageSection, ModerationStatus, Post,
    PostStatus, PostType, PriceType, Profile, Review, SectionType,
};
use crate::services::outbox::{OutboxTask, TaskKind};

const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn ts(dt: &NaiveDateTime) -> String {
    dt.format(TS_FORMAT).to_string()
}

fn parse_ts(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, TS_FORMAT).unwrap_or_else(|_| Utc::now().naive_utc())
}

fn now_ts() -> String {
    ts(&Utc::now().naive_utc())
}

// ── Profiles ──

pub fn upsert_profile(conn: &Connection, profile: &Profile) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO profiles (id, full_name, role, rating, total_reviews)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(id) DO UPDATE SET
           full_name = excluded.full_name,
           role = excluded.role,
           updated_at = datetime('now')",
        params![
            profile.id,
            profile.full_name,
            profile.role,
            profile.rating,
            profile.total_reviews,
        ],
    )?;
    Ok(())
}

pub fn get_profile(conn: &Connection, id: &str) -> anyhow::Result<Option<Profile>> {
    let result = conn.query_row(
        "SELECT id, full_name, role, rating, total_reviews FROM profiles WHERE id = ?1",
        params![id],
        |row| {
            Ok(Profile {
                id: row.get(0)?,
                full_name: row.get(1)?,
                role: row.get(2)?,
                rating: row.get(3)?,
                total_reviews: row.get(4)?,
            })
        },
    );

    match result {
        Ok(profile) => Ok(Some(profile)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Recompute the cached aggregate from the reviews table.
pub fn refresh_profile_rating(conn: &Connection, user_id: &str) -> anyhow::Result<()> {
    conn.execute(
        "UPDATE profiles SET
           rating = COALESCE((SELECT AVG(rating) FROM reviews WHERE reviewed_id = ?1), 0),
           total_reviews = (SELECT COUNT(*) FROM reviews WHERE reviewed_id = ?1),
           updated_at = datetime('now')
         WHERE id = ?1",
        params![user_id],
    )?;
    Ok(())
}

// ── Posts ──

const POST_COLUMNS: &str = "id, user_id, title, description, category_id, type, city, district, \
     price_min, price_max, price_type, images, phone_clicks, expires_at, status, \
     moderation_status, moderation_score, moderation_reason, moderated_at, \
     appeal_status, appeal_message, appealed_at, embedding, created_at, updated_at";

const POST_COLUMNS_P: &str = "p.id, p.user_id, p.title, p.description, p.category_id, p.type, \
     p.city, p.district, p.price_min, p.price_max, p.price_type, p.images, p.phone_clicks, \
     p.expires_at, p.status, p.moderation_status, p.moderation_score, p.moderation_reason, \
     p.moderated_at, p.appeal_status, p.appeal_message, p.appealed_at, p.embedding, \
     p.created_at, p.updated_at";

fn parse_post_row(row: &rusqlite::Row) -> anyhow::Result<Post> {
    let images_json: String = row.get(11)?;
    let images: Vec<String> = serde_json::from_str(&images_json).unwrap_or_default();

    let expires_at: Option<String> = row.get(13)?;
    let moderated_at: Option<String> = row.get(18)?;
    let appeal_status: Option<String> = row.get(19)?;
    let appealed_at: Option<String> = row.get(21)?;
    let created_at: String = row.get(23)?;
    let updated_at: String = row.get(24)?;

    let status_str: String = row.get(14)?;
    let moderation_str: String = row.get(15)?;
    let type_str: String = row.get(5)?;
    let price_type_str: String = row.get(10)?;

    Ok(Post {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        category_id: row.get(4)?,
        post_type: PostType::parse(&type_str),
        city: row.get(6)?,
        district: row.get(7)?,
        price_min: row.get(8)?,
        price_max: row.get(9)?,
        price_type: PriceType::parse(&price_type_str),
        images,
        phone_clicks: row.get(12)?,
        expires_at: expires_at.as_deref().map(parse_ts),
        status: PostStatus::parse(&status_str),
        moderation_status: ModerationStatus::parse(&moderation_str),
        moderation_score: row.get(16)?,
        moderation_reason: row.get(17)?,
        moderated_at: moderated_at.as_deref().map(parse_ts),
        appeal_status: appeal_status.as_deref().and_then(AppealStatus::parse),
        appeal_message: row.get(20)?,
        appealed_at: appealed_at.as_deref().map(parse_ts),
        embedding: row.get(22)?,
        created_at: parse_ts(&created_at),
        updated_at: parse_ts(&updated_at),
    })
}

pub fn create_post(conn: &Connection, post: &Post) -> anyhow::Result<()> {
    let images_json = serde_json::to_string(&post.images)?;
    conn.execute(
        "INSERT INTO posts (id, user_id, title, description, category_id, type, city, district, \
         price_min, price_max, price_type, images, expires_at, status, moderation_status, \
         created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
        params![
            post.id,
            post.user_id,
            post.title,
            post.description,
            post.category_id,
            post.post_type.as_str(),
            post.city,
            post.district,
            post.price_min,
            post.price_max,
            post.price_type.as_str(),
            images_json,
            post.expires_at.as_ref().map(ts),
            post.status.as_str(),
            post.moderation_status.as_str(),
            ts(&post.created_at),
            ts(&post.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_post_by_id(conn: &Connection, id: &str) -> anyhow::Result<Option<Post>> {
    let sql = format!("SELECT {POST_COLUMNS} FROM posts WHERE id = ?1");
    let result = conn.query_row(&sql, params![id], |row| Ok(parse_post_row(row)));

    match result {
        Ok(post) => Ok(Some(post?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub struct PostSummary {
    pub post: Post,
    pub owner_name: String,
    pub owner_rating: f64,
    pub owner_total_reviews: i64,
    pub category_name: Option<String>,
}

#[derive(Default)]
pub struct PostFilters {
    pub search: Option<String>,
    pub city: Option<String>,
    pub category_ids: Option<Vec<String>>,
    pub post_type: Option<String>,
    pub sort: String,
    pub offset: i64,
    pub limit: i64,
}

pub fn list_active_posts(
    conn: &Connection,
    filters: &PostFilters,
) -> anyhow::Result<(Vec<PostSummary>, i64)> {
    let mut conditions = vec!["p.status = 'active'".to_string()];
    let mut args: Vec<Box<dyn rusqlite::types::ToSql>> = vec![];

    if let Some(search) = filters.search.as_deref().filter(|s| s.trim().len() >= 2) {
        let pattern = format!("%{}%", search.trim());
        conditions.push(format!(
            "(p.title LIKE ?{n} OR p.description LIKE ?{n})",
            n = args.len() + 1
        ));
        args.push(Box::new(pattern));
    }

    if let Some(city) = filters.city.as_deref().filter(|s| !s.is_empty()) {
        let pattern = format!("%{city}%");
        conditions.push(format!(
            "(p.city LIKE ?{n} OR p.district LIKE ?{n})",
            n = args.len() + 1
        ));
        args.push(Box::new(pattern));
    }

    if let Some(ids) = filters.category_ids.as_ref() {
        if ids.is_empty() {
            // A category filter that matched nothing matches no posts.
            conditions.push("0 = 1".to_string());
        } else {
            let placeholders: Vec<String> = (0..ids.len())
                .map(|i| format!("?{}", args.len() + 1 + i))
                .collect();
            conditions.push(format!("p.category_id IN ({})", placeholders.join(", ")));
            for id in ids {
                args.push(Box::new(id.clone()));
            }
        }
    }

    if let Some(post_type) = filters.post_type.as_deref().filter(|s| !s.is_empty()) {
        conditions.push(format!("p.type = ?{}", args.len() + 1));
        args.push(Box::new(post_type.to_string()));
    }

    let where_clause = conditions.join(" AND ");

    let order = match filters.sort.as_str() {
        "oldest" => "p.created_at ASC",
        "price_asc" => "COALESCE(p.price_min, 0) ASC",
        "price_desc" => "COALESCE(p.price_min, 0) DESC",
        _ => "p.created_at DESC",
    };

    let count_sql = format!("SELECT COUNT(*) FROM posts p WHERE {where_clause}");
    let arg_refs: Vec<&dyn rusqlite::types::ToSql> = args.iter().map(|a| a.as_ref()).collect();
    let total: i64 = conn.query_row(&count_sql, arg_refs.as_slice(), |row| row.get(0))?;

    let sql = format!(
        "SELECT {POST_COLUMNS_P}, pr.full_name, pr.rating, pr.total_reviews, c.name
         FROM posts p
         JOIN profiles pr ON pr.id = p.user_id
         LEFT JOIN categories c ON c.id = p.category_id
         WHERE {where_clause}
         ORDER BY {order}
         LIMIT ?{} OFFSET ?{}",
        args.len() + 1,
        args.len() + 2,
    );
    args.push(Box::new(filters.limit));
    args.push(Box::new(filters.offset));
    let arg_refs: Vec<&dyn rusqlite::types::ToSql> = args.iter().map(|a| a.as_ref()).collect();

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(arg_refs.as_slice(), |row| {
        let owner_name: String = row.get(25)?;
        let owner_rating: f64 = row.get(26)?;
        let owner_total_reviews: i64 = row.get(27)?;
        let category_name: Option<String> = row.get(28)?;
        Ok((
            parse_post_row(row),
            owner_name,
            owner_rating,
            owner_total_reviews,
            category_name,
        ))
    })?;

    let mut posts = vec![];
    for row in rows {
        let (post, owner_name, owner_rating, owner_total_reviews, category_name) = row?;
        posts.push(PostSummary {
            post: post?,
            owner_name,
            owner_rating,
            owner_total_reviews,
            category_name,
        });
    }
    Ok((posts, total))
}

pub fn list_posts_by_user(
    conn: &Connection,
    user_id: &str,
    only_active: bool,
) -> anyhow::Result<Vec<Post>> {
    let sql = if only_active {
        format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE user_id = ?1 AND status = 'active' \
             ORDER BY created_at DESC"
        )
    } else {
        format!("SELECT {POST_COLUMNS} FROM posts WHERE user_id = ?1 ORDER BY created_at DESC")
    };

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![user_id], |row| Ok(parse_post_row(row)))?;

    let mut posts = vec![];
    for row in rows {
        posts.push(row??);
    }
    Ok(posts)
}

pub fn update_post_status(conn: &Connection, id: &str, status: PostStatus) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE posts SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_str(), now_ts(), id],
    )?;
    Ok(count > 0)
}

/// Reactivation forces a fresh moderation pass: both fields move in one
/// statement so no reader ever sees an active-but-unchecked post.
pub fn reactivate_post(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE posts SET status = 'pending', moderation_status = 'checking', updated_at = ?1
         WHERE id = ?2",
        params![now_ts(), id],
    )?;
    Ok(count > 0)
}

pub fn set_moderation_result(
    conn: &Connection,
    post_id: &str,
    moderation_status: ModerationStatus,
    score: f64,
    reason: &str,
    post_status: PostStatus,
) -> anyhow::Result<()> {
    conn.execute(
        "UPDATE posts SET moderation_status = ?1, moderation_score = ?2, moderation_reason = ?3,
           moderated_at = ?4, status = ?5, updated_at = ?4
         WHERE id = ?6",
        params![
            moderation_status.as_str(),
            score,
            reason,
            now_ts(),
            post_status.as_str(),
            post_id,
        ],
    )?;
    Ok(())
}

/// Admin decision without a provider score.
pub fn set_moderation_decision(
    conn: &Connection,
    post_id: &str,
    moderation_status: ModerationStatus,
    post_status: PostStatus,
    reason: Option<&str>,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE posts SET moderation_status = ?1, moderation_reason = COALESCE(?2, moderation_reason),
           moderated_at = ?3, status = ?4, updated_at = ?3
         WHERE id = ?5",
        params![
            moderation_status.as_str(),
            reason,
            now_ts(),
            post_status.as_str(),
            post_id,
        ],
    )?;
    Ok(count > 0)
}

pub fn set_appeal(conn: &Connection, post_id: &str, message: &str) -> anyhow::Result<()> {
    conn.execute(
        "UPDATE posts SET appeal_status = 'pending', appeal_message = ?1, appealed_at = ?2,
           updated_at = ?2
         WHERE id = ?3",
        params![message, now_ts(), post_id],
    )?;
    Ok(())
}

pub fn resolve_appeal(conn: &Connection, post_id: &str, approve: bool) -> anyhow::Result<bool> {
    let count = if approve {
        conn.execute(
            "UPDATE posts SET appeal_status = 'approved', moderation_status = 'approved',
               status = 'active', updated_at = ?1
             WHERE id = ?2",
            params![now_ts(), post_id],
        )?
    } else {
        conn.execute(
            "UPDATE posts SET appeal_status = 'rejected', updated_at = ?1 WHERE id = ?2",
            params![now_ts(), post_id],
        )?
    };
    Ok(count > 0)
}

pub fn delete_post(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let count = conn.execute("DELETE FROM posts WHERE id = ?1", params![id])?;
    Ok(count > 0)
}

pub fn increment_phone_clicks(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE posts SET phone_clicks = phone_clicks + 1 WHERE id = ?1",
        params![id],
    )?;
    Ok(count > 0)
}

pub fn extend_post_expiry(
    conn: &Connection,
    id: &str,
    expires_at: &NaiveDateTime,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE posts SET expires_at = ?1, updated_at = ?2 WHERE id = ?3",
        params![ts(expires_at), now_ts(), id],
    )?;
    Ok(count > 0)
}

pub fn set_post_embedding(conn: &Connection, id: &str, literal: &str) -> anyhow::Result<()> {
    conn.execute(
        "UPDATE posts SET embedding = ?1, updated_at = ?2 WHERE id = ?3",
        params![literal, now_ts(), id],
    )?;
    Ok(())
}

pub fn list_posts_by_moderation_status(
    conn: &Connection,
    status: ModerationStatus,
    limit: i64,
) -> anyhow::Result<Vec<Post>> {
    let sql = format!(
        "SELECT {POST_COLUMNS} FROM posts WHERE moderation_status = ?1 \
         ORDER BY created_at DESC LIMIT ?2"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![status.as_str(), limit], |row| {
        Ok(parse_post_row(row))
    })?;

    let mut posts = vec![];
    for row in rows {
        posts.push(row??);
    }
    Ok(posts)
}

// ── Bookings ──

const BOOKING_COLUMNS: &str = "id, post_id, provider_id, client_id, scheduled_at, \
     duration_minutes, status, client_notes, created_at, updated_at";

fn parse_booking_row(row: &rusqlite::Row) -> anyhow::Result<Booking> {
    let scheduled_at: String = row.get(4)?;
    let status_str: String = row.get(6)?;
    let created_at: String = row.get(8)?;
    let updated_at: String = row.get(9)?;

    Ok(Booking {
        id: row.get(0)?,
        post_id: row.get(1)?,
        provider_id: row.get(2)?,
        client_id: row.get(3)?,
        scheduled_at: parse_ts(&scheduled_at),
        duration_minutes: row.get(5)?,
        status: BookingStatus::parse(&status_str),
        client_notes: row.get(7)?,
        created_at: parse_ts(&created_at),
        updated_at: parse_ts(&updated_at),
    })
}

pub fn create_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO bookings (id, post_id, provider_id, client_id, scheduled_at, \
         duration_minutes, status, client_notes, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            booking.id,
            booking.post_id,
            booking.provider_id,
            booking.client_id,
            ts(&booking.scheduled_at),
            booking.duration_minutes,
            booking.status.as_str(),
            booking.client_notes,
            ts(&booking.created_at),
            ts(&booking.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_booking_by_id(conn: &Connection, id: &str) -> anyhow::Result<Option<Booking>> {
    let sql = format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1");
    let result = conn.query_row(&sql, params![id], |row| Ok(parse_booking_row(row)));

    match result {
        Ok(booking) => Ok(Some(booking?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub struct BookingContext {
    pub booking: Booking,
    pub post_title: String,
    pub counterpart_id: String,
    pub counterpart_name: String,
    pub has_review: bool,
}

/// Non-cancelled bookings for one side of the marketplace, with the post
/// title, the other party and whether a review already exists.
pub fn bookings_for_user(
    conn: &Connection,
    user_id: &str,
    as_provider: bool,
) -> anyhow::Result<Vec<BookingContext>> {
    let (own_col, other_col) = if as_provider {
        ("provider_id", "client_id")
    } else {
        ("client_id", "provider_id")
    };

    let sql = format!(
        "SELECT b.id, b.post_id, b.provider_id, b.client_id, b.scheduled_at, \
                b.duration_minutes, b.status, b.client_notes, b.created_at, b.updated_at, \
                p.title, pr.id, pr.full_name, \
                EXISTS(SELECT 1 FROM reviews r WHERE r.booking_id = b.id)
         FROM bookings b
         JOIN posts p ON p.id = b.post_id
         JOIN profiles pr ON pr.id = b.{other_col}
         WHERE b.{own_col} = ?1 AND b.status != 'cancelled'
         ORDER BY b.scheduled_at ASC"
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![user_id], |row| {
        let post_title: String = row.get(10)?;
        let counterpart_id: String = row.get(11)?;
        let counterpart_name: String = row.get(12)?;
        let has_review: bool = row.get::<_, i32>(13)? != 0;
        Ok((
            parse_booking_row(row),
            post_title,
            counterpart_id,
            counterpart_name,
            has_review,
        ))
    })?;

    let mut bookings = vec![];
    for row in rows {
        let (booking, post_title, counterpart_id, counterpart_name, has_review) = row?;
        bookings.push(BookingContext {
            booking: booking?,
            post_title,
            counterpart_id,
            counterpart_name,
            has_review,
        });
    }
    Ok(bookings)
}

/// Pending/confirmed slots for a provider on one day, for availability
/// display when a client picks a time.
pub fn bookings_for_provider_in_range(
    conn: &Connection,
    provider_id: &str,
    start: &NaiveDateTime,
    end: &NaiveDateTime,
) -> anyhow::Result<Vec<Booking>> {
    let sql = format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings
         WHERE provider_id = ?1 AND scheduled_at >= ?2 AND scheduled_at <= ?3
           AND status IN ('pending', 'confirmed')
         ORDER BY scheduled_at ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![provider_id, ts(start), ts(end)], |row| {
        Ok(parse_booking_row(row))
    })?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

/// Compare-and-set on status: a concurrent conflicting transition makes
/// this return false instead of silently overwriting.
pub fn update_booking_status_guarded(
    conn: &Connection,
    id: &str,
    from: BookingStatus,
    to: BookingStatus,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status = ?4",
        params![to.as_str(), now_ts(), id, from.as_str()],
    )?;
    Ok(count > 0)
}

// ── Reviews ──

pub fn has_review_for_booking(conn: &Connection, booking_id: &str) -> anyhow::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM reviews WHERE booking_id = ?1",
        params![booking_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn has_review_for_pair(
    conn: &Connection,
    reviewer_id: &str,
    reviewed_id: &str,
    post_id: &str,
) -> anyhow::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM reviews
         WHERE reviewer_id = ?1 AND reviewed_id = ?2 AND post_id = ?3",
        params![reviewer_id, reviewed_id, post_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Insert the review, flip the booking to reviewed and refresh the cached
/// rating in one transaction. A stale booking status aborts the whole lot.
pub fn submit_review(conn: &mut Connection, review: &Review) -> anyhow::Result<bool> {
    let tx = conn.transaction()?;

    tx.execute(
        "INSERT INTO reviews (id, booking_id, post_id, reviewer_id, reviewed_id, rating, comment, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            review.id,
            review.booking_id,
            review.post_id,
            review.reviewer_id,
            review.reviewed_id,
            review.rating,
            review.comment,
            ts(&review.created_at),
        ],
    )?;

    if let Some(booking_id) = &review.booking_id {
        let updated = tx.execute(
            "UPDATE bookings SET status = 'reviewed', updated_at = ?1
             WHERE id = ?2 AND status = 'completed'",
            params![now_ts(), booking_id],
        )?;
        if updated == 0 {
            // Booking moved under us; drop the review as well.
            return Ok(false);
        }
    }

    tx.execute(
        "UPDATE profiles SET
           rating = COALESCE((SELECT AVG(rating) FROM reviews WHERE reviewed_id = ?1), 0),
           total_reviews = (SELECT COUNT(*) FROM reviews WHERE reviewed_id = ?1),
           updated_at = datetime('now')
         WHERE id = ?1",
        params![review.reviewed_id],
    )?;

    tx.commit()?;
    Ok(true)
}

pub struct ReviewWithReviewer {
    pub review: Review,
    pub reviewer_name: String,
    pub post_title: Option<String>,
}

pub fn reviews_for_user(
    conn: &Connection,
    reviewed_id: &str,
) -> anyhow::Result<Vec<ReviewWithReviewer>> {
    let mut stmt = conn.prepare(
        "SELECT r.id, r.booking_id, r.post_id, r.reviewer_id, r.reviewed_id, r.rating, \
                r.comment, r.created_at, pr.full_name, p.title
         FROM reviews r
         JOIN profiles pr ON pr.id = r.reviewer_id
         LEFT JOIN posts p ON p.id = r.post_id
         WHERE r.reviewed_id = ?1
         ORDER BY r.created_at DESC",
    )?;

    let rows = stmt.query_map(params![reviewed_id], |row| {
        let created_at: String = row.get(7)?;
        Ok(ReviewWithReviewer {
            review: Review {
                id: row.get(0)?,
                booking_id: row.get(1)?,
                post_id: row.get(2)?,
                reviewer_id: row.get(3)?,
                reviewed_id: row.get(4)?,
                rating: row.get(5)?,
                comment: row.get(6)?,
                created_at: parse_ts(&created_at),
            },
            reviewer_name: row.get(8)?,
            post_title: row.get(9)?,
        })
    })?;

    let mut reviews = vec![];
    for row in rows {
        reviews.push(row?);
    }
    Ok(reviews)
}

// ── Categories ──

fn parse_category_row(row: &rusqlite::Row) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        parent_id: row.get(1)?,
        name: row.get(2)?,
        slug: row.get(3)?,
        icon: row.get(4)?,
        description: row.get(5)?,
        display_order: row.get(6)?,
    })
}

pub fn list_categories(conn: &Connection) -> anyhow::Result<Vec<Category>> {
    let mut stmt = conn.prepare(
        "SELECT id, parent_id, name, slug, icon, description, display_order
         FROM categories
         ORDER BY parent_id IS NOT NULL, COALESCE(parent_id, ''), display_order, name",
    )?;
    let rows = stmt.query_map([], parse_category_row)?;

    let mut categories = vec![];
    for row in rows {
        categories.push(row?);
    }
    Ok(categories)
}

pub fn get_category(conn: &Connection, id: &str) -> anyhow::Result<Option<Category>> {
    let result = conn.query_row(
        "SELECT id, parent_id, name, slug, icon, description, display_order
         FROM categories WHERE id = ?1",
        params![id],
        parse_category_row,
    );

    match result {
        Ok(category) => Ok(Some(category)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn category_id_by_slug(conn: &Connection, slug: &str) -> anyhow::Result<Option<String>> {
    let result = conn.query_row(
        "SELECT id FROM categories WHERE slug = ?1 ORDER BY parent_id IS NOT NULL LIMIT 1",
        params![slug],
        |row| row.get(0),
    );

    match result {
        Ok(id) => Ok(Some(id)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// The category itself plus every descendant, for filter queries.
pub fn category_subtree_ids(conn: &Connection, root_id: &str) -> anyhow::Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "WITH RECURSIVE subtree(id) AS (
            SELECT id FROM categories WHERE id = ?1
            UNION ALL
            SELECT c.id FROM categories c JOIN subtree s ON c.parent_id = s.id
         )
         SELECT id FROM subtree",
    )?;
    let rows = stmt.query_map(params![root_id], |row| row.get(0))?;

    let mut ids = vec![];
    for row in rows {
        ids.push(row?);
    }
    Ok(ids)
}

pub fn create_category(conn: &Connection, category: &Category) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO categories (id, parent_id, name, slug, icon, description, display_order)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            category.id,
            category.parent_id,
            category.name,
            category.slug,
            category.icon,
            category.description,
            category.display_order,
        ],
    )?;
    Ok(())
}

pub fn update_category(conn: &Connection, category: &Category) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE categories SET name = ?1, slug = ?2, icon = ?3, description = ?4 WHERE id = ?5",
        params![
            category.name,
            category.slug,
            category.icon,
            category.description,
            category.id,
        ],
    )?;
    Ok(count > 0)
}

/// Children are re-parented to the deleted node's parent, keeping the tree
/// connected.
pub fn delete_category(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    conn.execute(
        "UPDATE categories SET parent_id = (SELECT parent_id FROM categories WHERE id = ?1)
         WHERE parent_id = ?1",
        params![id],
    )?;
    let count = conn.execute("DELETE FROM categories WHERE id = ?1", params![id])?;
    Ok(count > 0)
}

pub fn set_category_order(conn: &Connection, id: &str, display_order: i64) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE categories SET display_order = ?1 WHERE id = ?2",
        params![display_order, id],
    )?;
    Ok(count > 0)
}

/// Reassign display_order by name within one parent scope.
pub fn sort_categories_alphabetically(
    conn: &Connection,
    parent_id: Option<&str>,
) -> anyhow::Result<usize> {
    let ids: Vec<String> = {
        let (sql, use_param) = match parent_id {
            Some(_) => (
                "SELECT id FROM categories WHERE parent_id = ?1 ORDER BY name COLLATE NOCASE",
                true,
            ),
            None => (
                "SELECT id FROM categories WHERE parent_id IS NULL ORDER BY name COLLATE NOCASE",
                false,
            ),
        };
        let mut stmt = conn.prepare(sql)?;
        let mut ids = vec![];
        if use_param {
            let rows = stmt.query_map(params![parent_id], |row| row.get(0))?;
            for row in rows {
                ids.push(row?);
            }
        } else {
            let rows = stmt.query_map([], |row| row.get(0))?;
            for row in rows {
                ids.push(row?);
            }
        }
        ids
    };

    for (index, id) in ids.iter().enumerate() {
        conn.execute(
            "UPDATE categories SET display_order = ?1 WHERE id = ?2",
            params![index as i64, id],
        )?;
    }
    Ok(ids.len())
}

// ── Homepage sections ──

const SECTION_COLUMNS: &str = "id, section_type, title, subtitle, config, is_active, \
     visible_on_mobile, visible_on_desktop, sort_order, created_at, updated_at";

fn parse_section_row(row: &rusqlite::Row) -> anyhow::Result<HomepageSection> {
    let type_str: String = row.get(1)?;
    let config_json: String = row.get(4)?;
    let created_at: String = row.get(9)?;
    let updated_at: String = row.get(10)?;

    let section_type = SectionType::parse(&type_str)
        .ok_or_else(|| anyhow::anyhow!("unknown section type in database: {type_str}"))?;

    Ok(HomepageSection {
        id: row.get(0)?,
        section_type,
        title: row.get(2)?,
        subtitle: row.get(3)?,
        config: serde_json::from_str(&config_json).unwrap_or(serde_json::json!({})),
        is_active: row.get::<_, i32>(5)? != 0,
        visible_on_mobile: row.get::<_, i32>(6)? != 0,
        visible_on_desktop: row.get::<_, i32>(7)? != 0,
        sort_order: row.get(8)?,
        created_at: parse_ts(&created_at),
        updated_at: parse_ts(&updated_at),
    })
}

pub fn list_sections(conn: &Connection) -> anyhow::Result<Vec<HomepageSection>> {
    let sql = format!("SELECT {SECTION_COLUMNS} FROM homepage_sections ORDER BY sort_order, created_at");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], |row| Ok(parse_section_row(row)))?;

    let mut sections = vec![];
    for row in rows {
        sections.push(row??);
    }
    Ok(sections)
}

pub fn list_active_sections(
    conn: &Connection,
    surface: &str,
) -> anyhow::Result<Vec<HomepageSection>> {
    let visibility = match surface {
        "mobile" => "visible_on_mobile = 1",
        _ => "visible_on_desktop = 1",
    };
    let sql = format!(
        "SELECT {SECTION_COLUMNS} FROM homepage_sections
         WHERE is_active = 1 AND {visibility}
         ORDER BY sort_order, created_at"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], |row| Ok(parse_section_row(row)))?;

    let mut sections = vec![];
    for row in rows {
        sections.push(row??);
    }
    Ok(sections)
}

pub fn get_section(conn: &Connection, id: &str) -> anyhow::Result<Option<HomepageSection>> {
    let sql = format!("SELECT {SECTION_COLUMNS} FROM homepage_sections WHERE id = ?1");
    let result = conn.query_row(&sql, params![id], |row| Ok(parse_section_row(row)));

    match result {
        Ok(section) => Ok(Some(section?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn create_section(conn: &Connection, section: &HomepageSection) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO homepage_sections (id, section_type, title, subtitle, config, is_active, \
         visible_on_mobile, visible_on_desktop, sort_order, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            section.id,
            section.section_type.as_str(),
            section.title,
            section.subtitle,
            serde_json::to_string(&section.config)?,
            section.is_active as i32,
            section.visible_on_mobile as i32,
            section.visible_on_desktop as i32,
            section.sort_order,
            ts(&section.created_at),
            ts(&section.updated_at),
        ],
    )?;
    Ok(())
}

pub fn update_section(conn: &Connection, section: &HomepageSection) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE homepage_sections SET title = ?1, subtitle = ?2, config = ?3, is_active = ?4,
           visible_on_mobile = ?5, visible_on_desktop = ?6, updated_at = ?7
         WHERE id = ?8",
        params![
            section.title,
            section.subtitle,
            serde_json::to_string(&section.config)?,
            section.is_active as i32,
            section.visible_on_mobile as i32,
            section.visible_on_desktop as i32,
            now_ts(),
            section.id,
        ],
    )?;
    Ok(count > 0)
}

pub fn delete_section(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let count = conn.execute(
        "DELETE FROM homepage_sections WHERE id = ?1",
        params![id],
    )?;
    Ok(count > 0)
}

pub fn set_section_order(conn: &Connection, id: &str, sort_order: i64) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE homepage_sections SET sort_order = ?1, updated_at = ?2 WHERE id = ?3",
        params![sort_order, now_ts(), id],
    )?;
    Ok(count > 0)
}

// ── Moderation & activity logs ──

pub fn insert_moderation_log(
    conn: &Connection,
    post_id: &str,
    action: &str,
    previous_status: Option<&str>,
    new_status: Option<&str>,
    reason: Option<&str>,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO moderation_logs (post_id, action, previous_status, new_status, reason)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![post_id, action, previous_status, new_status, reason],
    )?;
    Ok(())
}

pub struct ModerationLogEntry {
    pub id: i64,
    pub post_id: String,
    pub action: String,
    pub previous_status: Option<String>,
    pub new_status: Option<String>,
    pub reason: Option<String>,
    pub created_at: String,
}

pub fn moderation_logs_for_post(
    conn: &Connection,
    post_id: &str,
) -> anyhow::Result<Vec<ModerationLogEntry>> {
    let mut stmt = conn.prepare(
        "SELECT id, post_id, action, previous_status, new_status, reason, created_at
         FROM moderation_logs WHERE post_id = ?1 ORDER BY id ASC",
    )?;
    let rows = stmt.query_map(params![post_id], |row| {
        Ok(ModerationLogEntry {
            id: row.get(0)?,
            post_id: row.get(1)?,
            action: row.get(2)?,
            previous_status: row.get(3)?,
            new_status: row.get(4)?,
            reason: row.get(5)?,
            created_at: row.get(6)?,
        })
    })?;

    let mut logs = vec![];
    for row in rows {
        logs.push(row?);
    }
    Ok(logs)
}

pub fn insert_activity(
    conn: &Connection,
    user_id: &str,
    activity_type: &str,
    post_id: Option<&str>,
    metadata: &serde_json::Value,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO activity_logs (user_id, activity_type, post_id, metadata)
         VALUES (?1, ?2, ?3, ?4)",
        params![user_id, activity_type, post_id, serde_json::to_string(metadata)?],
    )?;
    Ok(())
}

pub struct ActivityEntry {
    pub id: i64,
    pub activity_type: String,
    pub post_id: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: String,
}

pub fn activity_for_user(
    conn: &Connection,
    user_id: &str,
    limit: i64,
) -> anyhow::Result<Vec<ActivityEntry>> {
    let mut stmt = conn.prepare(
        "SELECT id, activity_type, post_id, metadata, created_at
         FROM activity_logs WHERE user_id = ?1 ORDER BY id DESC LIMIT ?2",
    )?;
    let rows = stmt.query_map(params![user_id, limit], |row| {
        let metadata_json: String = row.get(3)?;
        Ok(ActivityEntry {
            id: row.get(0)?,
            activity_type: row.get(1)?,
            post_id: row.get(2)?,
            metadata: serde_json::from_str(&metadata_json).unwrap_or(serde_json::json!({})),
            created_at: row.get(4)?,
        })
    })?;

    let mut entries = vec![];
    for row in rows {
        entries.push(row?);
    }
    Ok(entries)
}

// ── Outbox tasks ──

fn parse_outbox_row(row: &rusqlite::Row) -> anyhow::Result<OutboxTask> {
    let kind_str: String = row.get(1)?;
    let run_after: String = row.get(6)?;

    let kind = TaskKind::parse(&kind_str)
        .ok_or_else(|| anyhow::anyhow!("unknown outbox task kind: {kind_str}"))?;

    Ok(OutboxTask {
        id: row.get(0)?,
        kind,
        post_id: row.get(2)?,
        status: row.get(3)?,
        attempts: row.get(4)?,
        last_error: row.get(5)?,
        run_after: parse_ts(&run_after),
    })
}

pub fn enqueue_outbox_task(
    conn: &Connection,
    id: &str,
    kind: &str,
    post_id: &str,
    run_after: &NaiveDateTime,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO outbox_tasks (id, kind, post_id, run_after) VALUES (?1, ?2, ?3, ?4)",
        params![id, kind, post_id, ts(run_after)],
    )?;
    Ok(())
}

pub fn due_outbox_tasks(
    conn: &Connection,
    now: &NaiveDateTime,
    limit: i64,
) -> anyhow::Result<Vec<OutboxTask>> {
    let mut stmt = conn.prepare(
        "SELECT id, kind, post_id, status, attempts, last_error, run_after
         FROM outbox_tasks
         WHERE status = 'queued' AND run_after <= ?1
         ORDER BY run_after ASC LIMIT ?2",
    )?;
    let rows = stmt.query_map(params![ts(now), limit], |row| Ok(parse_outbox_row(row)))?;

    let mut tasks = vec![];
    for row in rows {
        tasks.push(row??);
    }
    Ok(tasks)
}

pub fn mark_outbox_running(conn: &Connection, id: &str) -> anyhow::Result<()> {
    conn.execute(
        "UPDATE outbox_tasks SET status = 'running', updated_at = ?1 WHERE id = ?2",
        params![now_ts(), id],
    )?;
    Ok(())
}

pub fn finish_outbox_task(
    conn: &Connection,
    id: &str,
    status: &str,
    attempts: i32,
    last_error: Option<&str>,
    run_after: Option<&NaiveDateTime>,
) -> anyhow::Result<()> {
    conn.execute(
        "UPDATE outbox_tasks SET status = ?1, attempts = ?2, last_error = ?3,
           run_after = COALESCE(?4, run_after), updated_at = ?5
         WHERE id = ?6",
        params![status, attempts, last_error, run_after.map(ts), now_ts(), id],
    )?;
    Ok(())
}

pub fn outbox_tasks_for_post(conn: &Connection, post_id: &str) -> anyhow::Result<Vec<OutboxTask>> {
    let mut stmt = conn.prepare(
        "SELECT id, kind, post_id, status, attempts, last_error, run_after
         FROM outbox_tasks WHERE post_id = ?1 ORDER BY created_at ASC",
    )?;
    let rows = stmt.query_map(params![post_id], |row| Ok(parse_outbox_row(row)))?;

    let mut tasks = vec![];
    for row in rows {
        tasks.push(row??);
    }
    Ok(tasks)
}

// ── Cities ──

pub struct City {
    pub name: String,
    pub region: String,
    pub population: i64,
}

pub fn search_cities(conn: &Connection, query: &str, limit: i64) -> anyhow::Result<Vec<City>> {
    let pattern = format!("{query}%");
    let mut stmt = conn.prepare(
        "SELECT name, region, population FROM cities
         WHERE name LIKE ?1
         ORDER BY population DESC, name ASC LIMIT ?2",
    )?;
    let rows = stmt.query_map(params![pattern, limit], |row| {
        Ok(City {
            name: row.get(0)?,
            region: row.get(1)?,
            population: row.get(2)?,
        })
    })?;

    let mut cities = vec![];
    for row in rows {
        cities.push(row?);
    }
    Ok(cities)
}

pub fn upsert_city(
    conn: &Connection,
    name: &str,
    region: &str,
    population: i64,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO cities (name, region, population) VALUES (?1, ?2, ?3)
         ON CONFLICT(name) DO UPDATE SET region = excluded.region, population = excluded.population",
        params![name, region, population],
    )?;
    Ok(())
}

// ── Admin stats ──

pub struct AdminStats {
    pub active_posts: i64,
    pub pending_moderation: i64,
    pub open_appeals: i64,
    pub upcoming_bookings: i64,
}

pub fn get_admin_stats(conn: &Connection) -> anyhow::Result<AdminStats> {
    let active_posts: i64 = conn
        .query_row("SELECT COUNT(*) FROM posts WHERE status = 'active'", [], |row| row.get(0))
        .unwrap_or(0);

    let pending_moderation: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM posts WHERE moderation_status IN ('pending', 'checking', 'flagged')",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    let open_appeals: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM posts WHERE appeal_status IN ('pending', 'reviewing')",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    let upcoming_bookings: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM bookings WHERE scheduled_at > ?1 AND status = 'confirmed'",
            params![now_ts()],
            |row| row.get(0),
        )
        .unwrap_or(0);

    Ok(AdminStats {
        active_posts,
        pending_moderation,
        open_appeals,
        upcoming_bookings,
    })
}
