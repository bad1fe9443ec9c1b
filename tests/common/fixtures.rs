//! Test fixture creation
//!
//! Seeds a small family catalog and the user database into a temporary
//! directory. Ids in `constants.rs` follow the insertion order below.

use super::constants::*;
use anyhow::Result;
use family_films_catalog::catalog_store::queries::*;
use family_films_catalog::catalog_store::{FilmUpsert, NewChapter, SqliteCatalogStore, TagCategory};
use family_films_catalog::user::{SqliteUserStore, UserManager};
use std::path::Path;

fn film(file_id: &str, title: &str, years: &str, youtube_id: &str) -> FilmUpsert {
    FilmUpsert {
        file_id: file_id.to_string(),
        title: title.to_string(),
        description: format!("{} home movie", title),
        years: years.to_string(),
        youtube_url: format!("https://www.youtube.com/watch?v={}", youtube_id),
        thumbnail_url: format!("https://img.youtube.com/vi/{}/maxresdefault.jpg", youtube_id),
        youtube_id: youtube_id.to_string(),
        duration: Some(566),
        ..Default::default()
    }
}

fn chapter(film_id: i64, start_time: &str, title: &str, years: &str, order: i64) -> NewChapter {
    NewChapter {
        film_id,
        start_time: start_time.to_string(),
        title: title.to_string(),
        years: years.to_string(),
        order,
        ..Default::default()
    }
}

/// Creates `catalog.db` in `dir` and fills it with the fixture family.
pub fn create_test_catalog(dir: &Path) -> Result<SqliteCatalogStore> {
    let store = SqliteCatalogStore::new(dir.join("catalog.db"), 2)?;

    store.write(|conn| {
        let (disney, _) = upsert_film(conn, &film(FILM_DISNEY, FILM_DISNEY_TITLE, "1962", "yt_disney62"))?;
        let (xmas, _) = upsert_film(conn, &film(FILM_XMAS, FILM_XMAS_TITLE, "1970", "yt_xmas70"))?;
        upsert_film(
            conn,
            &film(FILM_PENDING, FILM_PENDING_TITLE, "1980", &format!("placeholder_{}", FILM_PENDING)),
        )?;

        let arrival = insert_chapter(conn, &chapter(disney, "0:00", "Arrival", "1962", 1))?;
        insert_chapter(conn, &chapter(disney, "1:30", "Main Street", "1963", 2))?;
        let tree = insert_chapter(conn, &chapter(xmas, "0:00", "Tree", "", 1))?;

        let ruth = insert_person(conn, "Ruth", "Hayward", "Grandmother of the family", Some(1))?;
        let doug = insert_person(conn, "Doug", "Thompson", "", None)?;
        insert_person(conn, "Sandy", "Thompson", "", None)?;
        let george = insert_person(conn, "George", "Hayward", "", Some(2))?;
        let cal = insert_person(conn, "Cal", "Hayward", "", None)?;
        let ruth_blank = insert_person(conn, "Ruth", "", "", None)?;
        set_life_dates(conn, ruth, Some("1930-05-01"), None)?;
        set_spouse(conn, ruth, Some(george))?;
        set_parents(conn, cal, Some(george), Some(ruth))?;

        let anaheim = insert_location(conn, "Anaheim", "")?;
        let disneyland = insert_location(conn, "Disneyland", "")?;
        let reno = insert_location(conn, "Reno", "")?;

        get_or_create_tag(conn, TAG_DISNEY, TagCategory::Themes)?;
        get_or_create_tag(conn, TAG_PARADE, TagCategory::Activities)?;
        get_or_create_tag(conn, TAG_CHRISTMAS, TagCategory::Holidays)?;

        link(conn, FILM_PEOPLE, disney, &ruth)?;
        link(conn, FILM_LOCATIONS, disney, &anaheim)?;
        link(conn, FILM_TAGS, disney, &TAG_DISNEY)?;
        link(conn, CHAPTER_PEOPLE, arrival, &doug)?;
        link(conn, CHAPTER_LOCATIONS, arrival, &disneyland)?;
        link(conn, CHAPTER_TAGS, arrival, &TAG_PARADE)?;

        link(conn, FILM_PEOPLE, xmas, &george)?;
        link(conn, FILM_PEOPLE, xmas, &ruth_blank)?;
        link(conn, FILM_LOCATIONS, xmas, &reno)?;
        link(conn, FILM_TAGS, xmas, &TAG_CHRISTMAS)?;
        link(conn, CHAPTER_PEOPLE, tree, &cal)?;

        for chapter_id in [arrival, tree] {
            update_chapter_metadata_flags(conn, chapter_id)?;
        }
        Ok::<_, anyhow::Error>(())
    })?;

    Ok(store)
}

/// Creates `user.db` in `dir` with one regular and one staff user.
pub fn create_test_users(dir: &Path) -> Result<UserManager> {
    let mut manager = UserManager::new(Box::new(SqliteUserStore::new(dir.join("user.db"))?));
    manager.add_user(TEST_USER, false)?;
    manager.set_password(TEST_USER, TEST_PASS)?;
    manager.add_user(STAFF_USER, true)?;
    manager.set_password(STAFF_USER, STAFF_PASS)?;
    Ok(manager)
}
