// Parser for the BSD `route -n get` report

use super::Route;

/// Parse the `key: value` report printed by `route -n get <dest>`:
///
/// ```text
///    route to: 10.42.0.0
/// destination: 10.42.0.0
///        mask: 255.255.0.0
///     gateway: 192.168.105.2
///   interface: bridge100
///       flags: <UP,GATEWAY,DONE,STATIC,PRCLONING>
/// ```
///
/// Unknown keys and the trailing metrics table are ignored.
pub fn parse_route_get(output: &str) -> Route {
    let mut route = Route::default();

    for line in output.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }

        match key.trim() {
            "destination" => route.destination = Some(value.to_string()),
            "mask" => route.mask = value.parse().ok(),
            "gateway" => route.gateway = value.parse().ok(),
            "interface" => route.interface = Some(value.to_string()),
            "flags" => {
                route.flags = value
                    .trim_start_matches('<')
                    .trim_end_matches('>')
                    .split(',')
                    .filter(|f| !f.is_empty())
                    .map(String::from)
                    .collect();
            }
            _ => {}
        }
    }

    route
}
