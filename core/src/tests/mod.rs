mod concurrency;
mod db;
mod fixtures;
