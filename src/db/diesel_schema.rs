// Diesel table definitions, kept in sync with the DDL in schema.rs.

diesel::table! {
    posts (id) {
        id -> Text,
        group_id -> Text,
        author_member_id -> Text,
        event_id -> Nullable<Text>,
        content_text -> Nullable<Text>,
        visibility -> Text,
        is_deleted -> Integer,
        media_count -> Integer,
        like_count -> Integer,
        comment_count -> Integer,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    comments (id) {
        id -> Text,
        post_id -> Text,
        author_member_id -> Text,
        content_text -> Text,
        is_deleted -> Integer,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    likes (id) {
        id -> Text,
        post_id -> Text,
        member_id -> Text,
        created_at -> Text,
    }
}

diesel::table! {
    media_attachments (id) {
        id -> Text,
        post_id -> Text,
        media_type -> Text,
        object_key -> Text,
        mime_type -> Text,
        size_bytes -> BigInt,
        duration_sec -> Nullable<Integer>,
        order_index -> Integer,
        transcode_status -> Nullable<Text>,
        created_at -> Text,
    }
}

diesel::table! {
    challenges (id) {
        id -> Text,
        group_id -> Text,
        event_id -> Nullable<Text>,
        tag -> Text,
        title -> Text,
        description -> Nullable<Text>,
        active -> Integer,
        start_at -> Nullable<Text>,
        end_at -> Nullable<Text>,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    challenge_participations (id) {
        id -> Text,
        challenge_id -> Text,
        post_id -> Text,
        member_id -> Nullable<Text>,
        created_at -> Text,
    }
}

diesel::joinable!(comments -> posts (post_id));
diesel::joinable!(likes -> posts (post_id));
diesel::joinable!(media_attachments -> posts (post_id));
diesel::joinable!(challenge_participations -> challenges (challenge_id));

diesel::allow_tables_to_appear_in_same_query!(
    posts,
    comments,
    likes,
    media_attachments,
    challenges,
    challenge_participations,
);
