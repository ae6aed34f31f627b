use rocket::{Request, catch, response::content::RawHtml};

fn page(status: u16, message: &str) -> RawHtml<String> {
    RawHtml(format!(
        "<!DOCTYPE html><html><head><title>{status}</title></head>\
         <body><h1>{status}</h1><p>{message}</p><a href=\"/\">Back to voting</a></body></html>"
    ))
}

#[catch(400)]
pub fn bad_request(_req: &Request) -> RawHtml<String> {
    page(400, "Invalid request parameters.")
}

#[catch(404)]
pub fn not_found(_req: &Request) -> RawHtml<String> {
    page(404, "The requested resource was not found.")
}

#[catch(422)]
pub fn unprocessable(_req: &Request) -> RawHtml<String> {
    page(422, "The submitted form could not be read.")
}

#[catch(500)]
pub fn internal_error(_req: &Request) -> RawHtml<String> {
    page(500, "An internal server error occurred.")
}

#[catch(503)]
pub fn service_unavailable(_req: &Request) -> RawHtml<String> {
    page(503, "Vote counts are temporarily unavailable.")
}
