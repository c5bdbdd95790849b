//! SQL for the app listings. Every listing binds the same leading
//! parameters: `$1` username, `$2` favorites group index, `$3` candidate app
//! IDs as text.

/// Whether `a.id` is in the favorites category of user `$1`.
macro_rules! is_favorite {
    () => {
        "EXISTS (
            SELECT 1 FROM users fu
            JOIN workspace w ON fu.id = w.user_id
            JOIN app_category_group acg ON w.root_category_id = acg.parent_category_id
            JOIN app_category_app aca ON acg.child_category_id = aca.app_category_id
            WHERE fu.username = $1
            AND acg.child_index = $2
            AND aca.app_id = a.id
        )"
    };
}

/// Apps integrated by user `$1`, newest first. `$4` is the limit.
pub const RECENTLY_ADDED_APPS: &str = concat!(
    "SELECT
        a.id::text AS id,
        'de' AS system_id,
        a.name,
        a.description,
        a.wiki_url,
        a.integration_date::timestamptz AS integration_date,
        a.edited_date::timestamptz AS edited_date,
        a.integrator_username AS username,
        ",
    is_favorite!(),
    " AS is_favorite,
        a.id = ANY(CAST($3 AS text[])::uuid[]) AS is_public
    FROM app_listing a
    WHERE NOT a.deleted
    AND NOT a.disabled
    AND a.integrator_username = $1
    ORDER BY a.integration_date DESC
    LIMIT $4"
);

/// Integrated candidate apps, newest first. `$4` is the limit.
pub const PUBLIC_APPS: &str = concat!(
    "SELECT
        a.id::text AS id,
        'de' AS system_id,
        a.name,
        a.description,
        a.wiki_url,
        a.integration_date::timestamptz AS integration_date,
        a.edited_date::timestamptz AS edited_date,
        a.integrator_username AS username,
        ",
    is_favorite!(),
    " AS is_favorite,
        TRUE AS is_public
    FROM app_listing a
    WHERE a.id = ANY(CAST($3 AS text[])::uuid[])
    AND NOT a.deleted
    AND NOT a.disabled
    AND a.integration_date IS NOT NULL
    ORDER BY a.integration_date DESC
    LIMIT $4"
);

/// Apps user `$1` started a job for within interval `$4`, most recent first.
/// `$5` is the limit.
pub const RECENTLY_USED_APPS: &str = concat!(
    "SELECT
        a.id::text AS id,
        'de' AS system_id,
        a.name,
        a.description,
        a.wiki_url,
        a.integration_date::timestamptz AS integration_date,
        a.edited_date::timestamptz AS edited_date,
        a.integrator_username AS username,
        ",
    is_favorite!(),
    " AS is_favorite,
        a.id = ANY(CAST($3 AS text[])::uuid[]) AS is_public,
        max(j.start_date) AS most_recent_start_date
    FROM jobs j
    JOIN users u ON j.user_id = u.id
    JOIN app_listing a ON a.id::text = j.app_id
    WHERE u.username = $1
    AND NOT a.deleted
    AND NOT a.disabled
    AND j.start_date > now() - CAST($4 AS interval)
    GROUP BY a.id, a.name, a.description, a.wiki_url, a.integration_date,
        a.edited_date, a.integrator_username
    ORDER BY most_recent_start_date DESC
    LIMIT $5"
);

/// Candidate apps ranked by the number of jobs started within interval `$4`.
/// Apps without jobs are kept with a count of zero. `$5` is the limit.
pub const POPULAR_FEATURED_APPS: &str = concat!(
    "SELECT
        a.id::text AS id,
        'de' AS system_id,
        a.name,
        a.description,
        a.wiki_url,
        a.integration_date::timestamptz AS integration_date,
        a.edited_date::timestamptz AS edited_date,
        a.integrator_username AS username,
        COUNT(j.id) AS job_count,
        ",
    is_favorite!(),
    " AS is_favorite,
        TRUE AS is_public
    FROM app_listing a
    LEFT JOIN jobs j ON j.app_id = a.id::text
    WHERE a.id = ANY(CAST($3 AS text[])::uuid[])
    AND NOT a.deleted
    AND NOT a.disabled
    AND a.integration_date IS NOT NULL
    AND (j.start_date >= now() - CAST($4 AS interval) OR j.start_date IS NULL)
    GROUP BY a.id, a.name, a.description, a.wiki_url, a.integration_date,
        a.edited_date, a.integrator_username
    ORDER BY job_count DESC
    LIMIT $5"
);

/// Candidate apps anyone started a job for within interval `$4`, most recent
/// first. The username column is the integrator's. `$5` is the limit.
pub const RECENTLY_RAN_APPS: &str = concat!(
    "SELECT DISTINCT
        a.id::text AS id,
        'de' AS system_id,
        a.name,
        a.description,
        a.wiki_url,
        a.integration_date::timestamptz AS integration_date,
        a.edited_date::timestamptz AS edited_date,
        iu.username,
        ",
    is_favorite!(),
    " AS is_favorite,
        TRUE AS is_public,
        max(j.start_date) AS most_recent_start_date
    FROM jobs j
    JOIN apps a ON a.id::text = j.app_id
    JOIN integration_data d ON a.integration_data_id = d.id
    JOIN users iu ON d.user_id = iu.id
    WHERE a.id = ANY(CAST($3 AS text[])::uuid[])
    AND NOT a.deleted
    AND NOT a.disabled
    AND j.start_date > now() - CAST($4 AS interval)
    GROUP BY a.id, a.name, a.description, a.wiki_url, a.integration_date,
        a.edited_date, iu.username
    ORDER BY most_recent_start_date DESC
    LIMIT $5"
);

/// Fails when `$1` is not an interval the database accepts.
pub const VALIDATE_INTERVAL: &str = "SELECT CAST($1 AS interval)";

pub const SCHEMA_VERSION: &str = "SELECT version FROM version ORDER BY applied DESC LIMIT 1";
