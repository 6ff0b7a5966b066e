use std::time::Duration;

use actix_web::{
    get,
    http::header::ContentType,
    web::{Data, Query},
    App, HttpResponse, HttpServer, Responder,
};
use clap::Parser;
use serde::Deserialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

/*
   Local stand-in for the movies service the load tests are pointed at
*/
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value_t = 1337)]
    port: u16,

    /// Artificial delay added to every response, in milliseconds
    #[arg(short, long, default_value_t = 0)]
    delay_ms: u64,
}

pub struct Movie {
    pub title: &'static str,
    pub overview: &'static str,
    pub vote_average: f32,
    pub release_year: u16,
}

const MOVIES: &[Movie] = &[
    Movie {
        title: "The Shawshank Redemption",
        overview: "Two imprisoned men bond over a number of years.",
        vote_average: 8.7,
        release_year: 1994,
    },
    Movie {
        title: "The Godfather",
        overview: "The aging patriarch of an organized crime dynasty transfers control to his son.",
        vote_average: 8.7,
        release_year: 1972,
    },
    Movie {
        title: "Spirited Away",
        overview: "A young girl wanders into a world ruled by gods and witches.",
        vote_average: 8.5,
        release_year: 2001,
    },
    Movie {
        title: "Parasite",
        overview: "Greed and class discrimination threaten a newly formed symbiotic relationship.",
        vote_average: 8.5,
        release_year: 2019,
    },
    Movie {
        title: "The Dark Knight",
        overview: "Batman raises the stakes in his war on crime.",
        vote_average: 8.5,
        release_year: 2008,
    },
];

const MOVIES_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>Movies</title>
</head>
<body>
  <h1>Top rated movies</h1>
  <form action="/movie-list" method="get">
    <input type="search" name="search" placeholder="Search movies">
  </form>
  <div id="movie-list"></div>
</body>
</html>
"#;

/*
   Per-response delay shared with every handler
*/
#[derive(Clone, Copy)]
struct Delay(Duration);

impl Delay {
    async fn wait(&self) {
        if !self.0.is_zero() {
            tokio::time::sleep(self.0).await;
        }
    }
}

#[derive(Deserialize)]
struct ListQuery {
    search: Option<String>,
}

fn matching_movies(search: &str) -> impl Iterator<Item = &'static Movie> + '_ {
    let needle = search.trim().to_lowercase();
    MOVIES
        .iter()
        .filter(move |movie| needle.is_empty() || movie.title.to_lowercase().contains(&needle))
}

fn render_list<'a>(movies: impl Iterator<Item = &'a Movie>) -> String {
    let mut html = String::from("<ul>\n");
    for movie in movies {
        html.push_str(&format!(
            "  <li><h2>{} ({})</h2><p>{}</p><span>{:.1}</span></li>\n",
            movie.title, movie.release_year, movie.overview, movie.vote_average
        ));
    }
    html.push_str("</ul>\n");
    html
}

/*
   The landing page the benchmark hits by default
*/
#[get("/movies")]
async fn get_movies(delay: Data<Delay>) -> impl Responder {
    delay.wait().await;
    HttpResponse::Ok()
        .content_type(ContentType::html())
        .body(MOVIES_HTML)
}

/*
   Movies whose title contains the `search` query, case-insensitive
*/
#[get("/movie-list")]
async fn get_movie_list(delay: Data<Delay>, query: Query<ListQuery>) -> impl Responder {
    delay.wait().await;
    let search = query.search.as_deref().unwrap_or_default();
    HttpResponse::Ok()
        .content_type(ContentType::html())
        .body(render_list(matching_movies(search)))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let args = Args::parse();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let delay = Delay(Duration::from_millis(args.delay_ms));
    info!(port = args.port, delay_ms = args.delay_ms, "serving movies");
    HttpServer::new(move || {
        App::new()
            .app_data(Data::new(delay))
            .service(get_movies)
            .service(get_movie_list)
    })
    .bind(("0.0.0.0", args.port))?
    .run()
    .await
}

#[cfg(test)]
mod tests {
    use actix_web::test;

    use super::*;

    async fn get(uri: &str) -> (u16, String) {
        let app = test::init_service(
            App::new()
                .app_data(Data::new(Delay(Duration::ZERO)))
                .service(get_movies)
                .service(get_movie_list),
        )
        .await;
        let request = test::TestRequest::get().uri(uri).to_request();
        let response = test::call_service(&app, request).await;
        let status = response.status().as_u16();
        let body = test::read_body(response).await;
        (status, String::from_utf8(body.to_vec()).expect("utf8 body"))
    }

    #[actix_web::test]
    async fn serves_movies_page() {
        let (status, body) = get("/movies").await;
        assert_eq!(status, 200);
        assert!(body.contains("<h1>Top rated movies</h1>"));
    }

    #[actix_web::test]
    async fn lists_every_movie_without_search() {
        let (status, body) = get("/movie-list").await;
        assert_eq!(status, 200);
        assert_eq!(body.matches("<li>").count(), MOVIES.len());
    }

    #[actix_web::test]
    async fn filters_list_by_title() {
        let (_, body) = get("/movie-list?search=THE").await;
        assert_eq!(body.matches("<li>").count(), 3);
        assert!(body.contains("The Godfather (1972)"));
        assert!(!body.contains("Parasite"));
    }

    #[actix_web::test]
    async fn unknown_paths_are_not_found() {
        let (status, _) = get("/series").await;
        assert_eq!(status, 404);
    }

    #[::core::prelude::v1::test]
    fn empty_search_matches_everything() {
        assert_eq!(matching_movies("  ").count(), MOVIES.len());
        assert_eq!(matching_movies("spirited").count(), 1);
    }
}
