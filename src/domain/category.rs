use serde::Serialize;

/// Kind of point of interest collected per state and year
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Category {
    #[serde(rename = "Fast Food")]
    FastFood,
    #[serde(rename = "Grocery")]
    Grocery,
}

impl Category {
    pub const ALL: [Category; 2] = [Category::FastFood, Category::Grocery];

    /// Label written to the `Tag` column
    pub fn label(self) -> &'static str {
        match self {
            Category::FastFood => "Fast Food",
            Category::Grocery => "Grocery",
        }
    }

    /// OSM (key, value) tag that identifies this category
    pub fn osm_tag(self) -> (&'static str, &'static str) {
        match self {
            Category::FastFood => ("amenity", "fast_food"),
            Category::Grocery => ("shop", "supermarket"),
        }
    }

    /// Render the Overpass QL query for one state as the map looked on
    /// January 1st of `year`.
    ///
    /// The state is matched by name against admin_level 4 boundaries, which
    /// is how OSM tags US states (and the District of Columbia).
    pub fn query(self, year: i32, state: &str, timeout_secs: u64) -> String {
        let (key, value) = self.osm_tag();
        format!(
            r#"[out:json][timeout:{timeout_secs}][date:"{year}-01-01T00:00:00Z"];
area["name"="{state}"]["admin_level"="4"]->.searchArea;
(
  node["{key}"="{value}"](area.searchArea);
);
out center;"#
        )
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
