pub mod http_date;
